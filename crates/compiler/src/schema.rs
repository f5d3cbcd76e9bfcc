//! Function-schema projection for external UI/host consumers (spec §6).

use yasn_core::{FunctionSchema, ParamSchema, SchemaTypeNode};

use crate::ast::{FunctionDecl, Module, Stmt};
use crate::types::{Primitive, TypeNode};

fn project_type(t: &TypeNode) -> SchemaTypeNode {
    match t {
        TypeNode::Primitive(p) => SchemaTypeNode::Primitive {
            name: primitive_name(*p).to_string(),
        },
        TypeNode::List(elem) => SchemaTypeNode::List {
            element: Box::new(project_type(elem)),
        },
        TypeNode::Dict(key, value) => SchemaTypeNode::Dict {
            key: Box::new(project_type(key)),
            value: Box::new(project_type(value)),
        },
        TypeNode::Union(variants) => SchemaTypeNode::Union {
            variants: variants.iter().map(project_type).collect(),
        },
    }
}

fn primitive_name(p: Primitive) -> &'static str {
    match p {
        Primitive::Int => "integer",
        Primitive::Float => "floating",
        Primitive::Str => "string",
        Primitive::Bool => "boolean",
        Primitive::Null => "null",
        Primitive::Any => "any",
    }
}

fn signature_text(f: &FunctionDecl) -> String {
    let params = f
        .params
        .iter()
        .map(|p| format!("{}: {}", p.name, p.type_node.display()))
        .collect::<Vec<_>>()
        .join(", ");
    let prefix = if f.is_async { "async function" } else { "function" };
    format!("{prefix} {}({params}) -> {}", f.name, f.return_type.display())
}

fn project_function(f: &FunctionDecl, module_has_explicit_exports: bool) -> FunctionSchema {
    FunctionSchema {
        name: f.name.clone(),
        params: f
            .params
            .iter()
            .map(|p| ParamSchema {
                name: p.name.clone(),
                type_rendered: p.type_node.display(),
                type_node: project_type(&p.type_node),
                ui: None,
            })
            .collect(),
        return_type: f.return_type.display(),
        return_type_node: project_type(&f.return_type),
        is_async: f.is_async,
        is_public_api: !module_has_explicit_exports || f.exported,
        signature: signature_text(f),
        ui: None,
    }
}

/// Projects every eligible top-level function of a (resolved, linked)
/// module into its host-facing schema. Excludes `main` and any resolver-
/// materialized `__mod_*` symbol.
pub fn project_module(module: &Module) -> Vec<FunctionSchema> {
    let any_exported = module.statements.iter().any(|s| match s {
        Stmt::Function(f) => f.exported,
        Stmt::Let { exported, .. } => *exported,
        _ => false,
    });
    module
        .statements
        .iter()
        .filter_map(|s| match s {
            Stmt::Function(f) if f.name != "main" && !f.name.starts_with("__mod_") => Some(f),
            _ => None,
        })
        .map(|f| project_function(f, any_exported))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse;

    #[test]
    fn excludes_main() {
        let src = "function main() -> null:\n  return null\nfunction helper() -> int:\n  return 1\n";
        let module = parse(tokenize(src).unwrap()).unwrap();
        let schema = project_module(&module);
        assert_eq!(schema.len(), 1);
        assert_eq!(schema[0].name, "helper");
    }

    #[test]
    fn is_public_api_true_without_explicit_exports() {
        let src = "function helper() -> int:\n  return 1\n";
        let module = parse(tokenize(src).unwrap()).unwrap();
        let schema = project_module(&module);
        assert!(schema[0].is_public_api);
    }

    #[test]
    fn is_public_api_requires_export_marker_once_any_exist() {
        let src = "export function a() -> int:\n  return 1\nfunction b() -> int:\n  return 2\n";
        let module = parse(tokenize(src).unwrap()).unwrap();
        let schema = project_module(&module);
        let a = schema.iter().find(|f| f.name == "a").unwrap();
        let b = schema.iter().find(|f| f.name == "b").unwrap();
        assert!(a.is_public_api);
        assert!(!b.is_public_api);
    }
}
