//! Static type checker (spec §4.4).

use std::collections::HashMap;

use yasn_core::{builtins, Diagnostic, DiagnosticKind, Position};

use crate::ast::{AssignTarget, BinOp, Expr, FunctionDecl, Literal, Module, Stmt, UnOp};
use crate::types::{Primitive, TypeNode};

fn type_error(msg: impl Into<String>, pos: Position) -> Diagnostic {
    Diagnostic::at(DiagnosticKind::Type, msg, pos)
}

#[derive(Debug, Clone)]
struct Signature {
    params: Vec<TypeNode>,
    return_type: TypeNode,
    is_async: bool,
}

struct Scope {
    vars: HashMap<String, TypeNode>,
    parent: Option<Box<Scope>>,
}

impl Scope {
    fn root() -> Self {
        Scope {
            vars: HashMap::new(),
            parent: None,
        }
    }

    fn child(self) -> Self {
        Scope {
            vars: HashMap::new(),
            parent: Some(Box::new(self)),
        }
    }

    fn pop(self) -> Self {
        *self.parent.expect("popped the root scope")
    }

    fn declare(&mut self, name: &str, t: TypeNode) {
        self.vars.insert(name.to_string(), t);
    }

    fn lookup(&self, name: &str) -> Option<TypeNode> {
        if let Some(t) = self.vars.get(name) {
            return Some(t.clone());
        }
        self.parent.as_ref().and_then(|p| p.lookup(name))
    }

    /// Flattens this scope and its ancestors into a single map, self shadowing
    /// parent. Used to seed a function body's scope from the enclosing
    /// (top-level) scope without borrowing it for the body's lifetime.
    fn snapshot(&self) -> HashMap<String, TypeNode> {
        let mut vars = match &self.parent {
            Some(p) => p.snapshot(),
            None => HashMap::new(),
        };
        vars.extend(self.vars.clone());
        vars
    }

    fn child_of(parent: &Scope) -> Self {
        Scope {
            vars: parent.snapshot(),
            parent: None,
        }
    }
}

struct Checker {
    functions: HashMap<String, Signature>,
    loop_depth: u32,
    current_return: Option<TypeNode>,
}

/// Type-checks a resolved [`Module`]. Returns the untouched module on success
/// (the checker performs no rewriting) so the same tree is handed to the
/// compiler.
pub fn check(module: &Module) -> Result<(), Diagnostic> {
    let functions = build_signature_table(module)?;
    let mut checker = Checker {
        functions,
        loop_depth: 0,
        current_return: None,
    };
    let mut root = Scope::root();
    for stmt in &module.statements {
        checker.check_top_level_let(stmt, &mut root);
    }
    for stmt in &module.statements {
        checker.check_stmt(stmt, &mut root)?;
    }
    Ok(())
}

fn build_signature_table(module: &Module) -> Result<HashMap<String, Signature>, Diagnostic> {
    let mut table = HashMap::new();
    for stmt in &module.statements {
        if let Stmt::Function(f) = stmt {
            if table.contains_key(&f.name) {
                return Err(type_error(format!("duplicate function '{}'", f.name), f.pos));
            }
            table.insert(
                f.name.clone(),
                Signature {
                    params: f.params.iter().map(|p| p.type_node.clone()).collect(),
                    return_type: f.return_type.clone(),
                    is_async: f.is_async,
                },
            );
        }
    }
    if let Some(sig) = table.get("main") {
        if !sig.params.is_empty() || sig.is_async || sig.return_type != TypeNode::null() {
            let pos = module
                .statements
                .iter()
                .find_map(|s| match s {
                    Stmt::Function(f) if f.name == "main" => Some(f.pos),
                    _ => None,
                })
                .unwrap_or(Position::new(1, 1));
            return Err(type_error(
                "'main' must take no parameters, return null, and not be async",
                pos,
            ));
        }
    }
    Ok(table)
}

impl Checker {
    fn check_top_level_let(&self, stmt: &Stmt, scope: &mut Scope) {
        if let Stmt::Let { name, .. } = stmt {
            scope.declare(name, TypeNode::any());
        }
    }

    fn check_stmt(&mut self, stmt: &Stmt, scope: &mut Scope) -> Result<(), Diagnostic> {
        match stmt {
            Stmt::Let {
                name,
                type_node,
                value,
                pos,
                ..
            } => {
                let actual = self.check_expr(value, scope)?;
                let bound = match type_node {
                    Some(t) => {
                        if !actual.assignable_to(t) {
                            return Err(type_error(
                                format!(
                                    "cannot assign value of type '{}' to '{}' of type '{}'",
                                    actual.display(),
                                    name,
                                    t.display()
                                ),
                                *pos,
                            ));
                        }
                        t.clone()
                    }
                    None => actual,
                };
                scope.declare(name, bound);
                Ok(())
            }
            Stmt::Assign { target, value, pos } => {
                let actual = self.check_expr(value, scope)?;
                match target {
                    AssignTarget::Name(name) => {
                        let expected = scope.lookup(name).ok_or_else(|| {
                            type_error(format!("assignment to undeclared name '{name}'"), *pos)
                        })?;
                        if !actual.assignable_to(&expected) {
                            return Err(type_error(
                                format!(
                                    "cannot assign value of type '{}' to '{}' of type '{}'",
                                    actual.display(),
                                    name,
                                    expected.display()
                                ),
                                *pos,
                            ));
                        }
                    }
                    AssignTarget::Index { target, index } => {
                        let target_t = self.check_expr(target, scope)?;
                        let index_t = self.check_expr(index, scope)?;
                        self.check_index_assign(&target_t, &index_t, &actual, *pos)?;
                    }
                }
                Ok(())
            }
            Stmt::Function(f) => self.check_function(f, scope),
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                pos,
            } => {
                let c = self.check_expr(cond, scope)?;
                self.require_boolish(&c, *pos)?;
                let mut inner = std::mem::replace(scope, Scope::root()).child();
                for s in then_branch {
                    self.check_stmt(s, &mut inner)?;
                }
                *scope = inner.pop();
                if let Some(else_branch) = else_branch {
                    let mut inner = std::mem::replace(scope, Scope::root()).child();
                    for s in else_branch {
                        self.check_stmt(s, &mut inner)?;
                    }
                    *scope = inner.pop();
                }
                Ok(())
            }
            Stmt::While { cond, body, pos } => {
                let c = self.check_expr(cond, scope)?;
                self.require_boolish(&c, *pos)?;
                self.loop_depth += 1;
                let mut inner = std::mem::replace(scope, Scope::root()).child();
                for s in body {
                    self.check_stmt(s, &mut inner)?;
                }
                *scope = inner.pop();
                self.loop_depth -= 1;
                Ok(())
            }
            Stmt::For {
                var,
                iterable,
                body,
                ..
            } => {
                let it = self.check_expr(iterable, scope)?;
                let elem = match &it {
                    TypeNode::List(e) => (**e).clone(),
                    TypeNode::Primitive(Primitive::Str) => TypeNode::str(),
                    TypeNode::Primitive(Primitive::Any) => TypeNode::any(),
                    other => {
                        return Err(type_error(
                            format!("cannot iterate over '{}'", other.display()),
                            iterable.pos(),
                        ));
                    }
                };
                self.loop_depth += 1;
                let mut inner = std::mem::replace(scope, Scope::root()).child();
                inner.declare(var, elem);
                for s in body {
                    self.check_stmt(s, &mut inner)?;
                }
                *scope = inner.pop();
                self.loop_depth -= 1;
                Ok(())
            }
            Stmt::Return { value, pos } => {
                let ret = self
                    .current_return
                    .clone()
                    .ok_or_else(|| type_error("'return' outside a function", *pos))?;
                let actual = match value {
                    Some(e) => self.check_expr(e, scope)?,
                    None => TypeNode::null(),
                };
                if !actual.assignable_to(&ret) {
                    return Err(type_error(
                        format!(
                            "return type '{}' is not assignable to declared return type '{}'",
                            actual.display(),
                            ret.display()
                        ),
                        *pos,
                    ));
                }
                Ok(())
            }
            Stmt::Break { pos } | Stmt::Continue { pos } => {
                if self.loop_depth == 0 {
                    return Err(type_error("'break'/'continue' outside a loop", *pos));
                }
                Ok(())
            }
            Stmt::Import { .. } => Ok(()),
            Stmt::ExprStmt { expr, .. } => {
                self.check_expr(expr, scope)?;
                Ok(())
            }
        }
    }

    fn check_function(&mut self, f: &FunctionDecl, root: &Scope) -> Result<(), Diagnostic> {
        let prev_return = self.current_return.replace(f.return_type.clone());
        let prev_loop = std::mem::replace(&mut self.loop_depth, 0);
        let mut scope = Scope::child_of(root);
        for p in &f.params {
            scope.declare(&p.name, p.type_node.clone());
        }
        for s in &f.body {
            self.check_stmt(s, &mut scope)?;
        }
        self.current_return = prev_return;
        self.loop_depth = prev_loop;
        Ok(())
    }

    fn require_boolish(&self, t: &TypeNode, pos: Position) -> Result<(), Diagnostic> {
        if *t == TypeNode::bool() || *t == TypeNode::any() {
            Ok(())
        } else {
            Err(type_error(
                format!("expected boolean condition, found '{}'", t.display()),
                pos,
            ))
        }
    }

    fn check_index_assign(
        &self,
        target: &TypeNode,
        index: &TypeNode,
        value: &TypeNode,
        pos: Position,
    ) -> Result<(), Diagnostic> {
        match target {
            TypeNode::List(elem) => {
                if !index.assignable_to(&TypeNode::int()) {
                    return Err(type_error("list index must be an integer", pos));
                }
                if !value.assignable_to(elem) {
                    return Err(type_error(
                        format!(
                            "cannot assign '{}' into list of '{}'",
                            value.display(),
                            elem.display()
                        ),
                        pos,
                    ));
                }
                Ok(())
            }
            TypeNode::Dict(key, val) => {
                if !index.assignable_to(key) {
                    return Err(type_error(
                        format!("dict key must be '{}'", key.display()),
                        pos,
                    ));
                }
                if !value.assignable_to(val) {
                    return Err(type_error(
                        format!(
                            "cannot assign '{}' into dict of '{}'",
                            value.display(),
                            val.display()
                        ),
                        pos,
                    ));
                }
                Ok(())
            }
            TypeNode::Primitive(Primitive::Any) => Ok(()),
            other => Err(type_error(
                format!("cannot index-assign into '{}'", other.display()),
                pos,
            )),
        }
    }

    fn check_expr(&self, expr: &Expr, scope: &Scope) -> Result<TypeNode, Diagnostic> {
        match expr {
            Expr::Literal { value, .. } => Ok(match value {
                Literal::Null => TypeNode::null(),
                Literal::Bool(_) => TypeNode::bool(),
                Literal::Int(_) => TypeNode::int(),
                Literal::Float(_) => TypeNode::float(),
                Literal::Str(_) => TypeNode::str(),
            }),
            Expr::Ident { name, pos } => scope
                .lookup(name)
                .or_else(|| self.functions.get(name).map(|_| TypeNode::any()))
                .ok_or_else(|| type_error(format!("undeclared name '{name}'"), *pos)),
            Expr::ListLit { items, .. } => {
                let mut variants = Vec::new();
                for i in items {
                    variants.push(self.check_expr(i, scope)?);
                }
                let elem = if variants.is_empty() {
                    TypeNode::any()
                } else {
                    TypeNode::union(variants)
                };
                Ok(TypeNode::list(elem))
            }
            Expr::DictLit { entries, .. } => {
                let mut keys = Vec::new();
                let mut values = Vec::new();
                for (k, v) in entries {
                    keys.push(self.check_expr(k, scope)?);
                    values.push(self.check_expr(v, scope)?);
                }
                let key = if keys.is_empty() { TypeNode::any() } else { TypeNode::union(keys) };
                let value = if values.is_empty() {
                    TypeNode::any()
                } else {
                    TypeNode::union(values)
                };
                Ok(TypeNode::dict(key, value))
            }
            Expr::Index { target, index, pos } => {
                let t = self.check_expr(target, scope)?;
                let i = self.check_expr(index, scope)?;
                match &t {
                    TypeNode::List(elem) => {
                        if !i.assignable_to(&TypeNode::int()) {
                            return Err(type_error("list index must be an integer", *pos));
                        }
                        Ok((**elem).clone())
                    }
                    TypeNode::Primitive(Primitive::Str) => {
                        if !i.assignable_to(&TypeNode::int()) {
                            return Err(type_error("string index must be an integer", *pos));
                        }
                        Ok(TypeNode::str())
                    }
                    TypeNode::Dict(key, value) => {
                        if !i.assignable_to(key) {
                            return Err(type_error(
                                format!("dict key must be '{}'", key.display()),
                                *pos,
                            ));
                        }
                        Ok((**value).clone())
                    }
                    TypeNode::Primitive(Primitive::Any) => Ok(TypeNode::any()),
                    other => Err(type_error(
                        format!("cannot index into '{}'", other.display()),
                        *pos,
                    )),
                }
            }
            Expr::Member { target, pos, .. } => {
                let t = self.check_expr(target, scope)?;
                match &t {
                    TypeNode::Dict(key, value) => {
                        if !TypeNode::str().assignable_to(key) {
                            return Err(type_error("member access requires string-keyed dict", *pos));
                        }
                        Ok((**value).clone())
                    }
                    TypeNode::Primitive(Primitive::Any) => Ok(TypeNode::any()),
                    other => Err(type_error(
                        format!("cannot access member on '{}'", other.display()),
                        *pos,
                    )),
                }
            }
            Expr::Unary { op, operand, pos } => {
                let t = self.check_expr(operand, scope)?;
                match op {
                    UnOp::Neg => {
                        if is_numeric(&t) || t == TypeNode::any() {
                            Ok(t)
                        } else {
                            Err(type_error(format!("cannot negate '{}'", t.display()), *pos))
                        }
                    }
                    UnOp::Not => {
                        if t == TypeNode::bool() || t == TypeNode::any() {
                            Ok(TypeNode::bool())
                        } else {
                            Err(type_error(format!("'not' requires boolean, found '{}'", t.display()), *pos))
                        }
                    }
                }
            }
            Expr::Await { operand, pos } => {
                self.check_expr(operand, scope)?;
                let _ = pos;
                Ok(TypeNode::any())
            }
            Expr::Binary { op, left, right, pos } => self.check_binary(*op, left, right, *pos, scope),
            Expr::Call { callee, args, pos } => self.check_call(callee, args, *pos, scope),
        }
    }

    fn check_binary(
        &self,
        op: BinOp,
        left: &Expr,
        right: &Expr,
        pos: Position,
        scope: &Scope,
    ) -> Result<TypeNode, Diagnostic> {
        let l = self.check_expr(left, scope)?;
        let r = self.check_expr(right, scope)?;
        match op {
            BinOp::Add => {
                if l == TypeNode::str() && r == TypeNode::str() {
                    Ok(TypeNode::str())
                } else if let (TypeNode::List(a), TypeNode::List(b)) = (&l, &r) {
                    Ok(TypeNode::list(TypeNode::union(vec![(**a).clone(), (**b).clone()])))
                } else if is_numeric(&l) && is_numeric(&r) {
                    Ok(numeric_result(&l, &r))
                } else if l == TypeNode::any() || r == TypeNode::any() {
                    Ok(TypeNode::any())
                } else {
                    Err(type_error(
                        format!("cannot add '{}' and '{}'", l.display(), r.display()),
                        pos,
                    ))
                }
            }
            BinOp::Sub | BinOp::Mul | BinOp::Mod => {
                self.require_numeric_pair(&l, &r, pos)?;
                Ok(numeric_result(&l, &r))
            }
            BinOp::Div => {
                self.require_numeric_pair(&l, &r, pos)?;
                if l == TypeNode::int() && r == TypeNode::int() {
                    Ok(TypeNode::int())
                } else {
                    Ok(TypeNode::float())
                }
            }
            BinOp::Eq | BinOp::Ne => Ok(TypeNode::bool()),
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                let both_numeric = is_numeric(&l) && is_numeric(&r);
                let both_string = l == TypeNode::str() && r == TypeNode::str();
                if both_numeric || both_string || l == TypeNode::any() || r == TypeNode::any() {
                    Ok(TypeNode::bool())
                } else {
                    Err(type_error(
                        format!("cannot compare '{}' and '{}'", l.display(), r.display()),
                        pos,
                    ))
                }
            }
            BinOp::And | BinOp::Or => {
                self.require_boolish(&l, pos)?;
                self.require_boolish(&r, pos)?;
                Ok(TypeNode::bool())
            }
        }
    }

    fn require_numeric_pair(&self, l: &TypeNode, r: &TypeNode, pos: Position) -> Result<(), Diagnostic> {
        if (is_numeric(l) || *l == TypeNode::any()) && (is_numeric(r) || *r == TypeNode::any()) {
            Ok(())
        } else {
            Err(type_error(
                format!("expected numeric operands, found '{}' and '{}'", l.display(), r.display()),
                pos,
            ))
        }
    }

    fn check_call(&self, callee: &Expr, args: &[Expr], pos: Position, scope: &Scope) -> Result<TypeNode, Diagnostic> {
        let name = match callee {
            Expr::Ident { name, .. } => name,
            other => {
                return Err(type_error("call target must be an identifier", other.pos()));
            }
        };
        let mut arg_types = Vec::with_capacity(args.len());
        for a in args {
            arg_types.push(self.check_expr(a, scope)?);
        }
        if let Some(sig) = self.functions.get(name) {
            if sig.params.len() != arg_types.len() {
                return Err(type_error(
                    format!(
                        "'{name}' expects {} argument(s), found {}",
                        sig.params.len(),
                        arg_types.len()
                    ),
                    pos,
                ));
            }
            for (expected, actual) in sig.params.iter().zip(&arg_types) {
                if !actual.assignable_to(expected) {
                    return Err(type_error(
                        format!(
                            "argument of type '{}' is not assignable to parameter of type '{}'",
                            actual.display(),
                            expected.display()
                        ),
                        pos,
                    ));
                }
            }
            return Ok(if sig.is_async { TypeNode::any() } else { sig.return_type.clone() });
        }
        if let Some(b) = builtins::lookup(name) {
            if !b.accepts(arg_types.len()) {
                return Err(type_error(
                    format!("'{name}' called with {} argument(s)", arg_types.len()),
                    pos,
                ));
            }
            return Ok(TypeNode::any());
        }
        Err(type_error(format!("call to undeclared function '{name}'"), pos))
    }
}

fn is_numeric(t: &TypeNode) -> bool {
    matches!(t, TypeNode::Primitive(Primitive::Int) | TypeNode::Primitive(Primitive::Float))
}

fn numeric_result(l: &TypeNode, r: &TypeNode) -> TypeNode {
    if *l == TypeNode::float() || *r == TypeNode::float() {
        TypeNode::float()
    } else {
        TypeNode::int()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse;

    fn check_src(src: &str) -> Result<(), Diagnostic> {
        let module = parse(tokenize(src).unwrap()).unwrap();
        check(&module)
    }

    #[test]
    fn accepts_simple_main() {
        assert!(check_src("function main() -> null:\n  print(\"hi\")\n").is_ok());
    }

    #[test]
    fn rejects_bad_main_signature() {
        assert!(check_src("function main() -> int:\n  return 1\n").is_err());
    }

    #[test]
    fn rejects_mismatched_let_annotation() {
        assert!(check_src("let x: int = \"oops\"\n").is_err());
    }

    #[test]
    fn int_is_assignable_to_float_annotation() {
        assert!(check_src("let x: float = 1\n").is_ok());
    }

    #[test]
    fn break_outside_loop_rejected() {
        assert!(check_src("function f() -> null:\n  break\n").is_err());
    }

    #[test]
    fn empty_list_is_any() {
        assert!(check_src("let xs: List[any] = []\n").is_ok());
    }

    #[test]
    fn builtin_arity_enforced() {
        assert!(check_src("function f() -> null:\n  print(1, 2)\n").is_err());
    }

    #[test]
    fn async_call_has_any_type() {
        assert!(check_src(
            "async function slow(n: int) -> int:\n  return n\nfunction main() -> null:\n  let t = slow(1)\n  print(wait(t))\n"
        )
        .is_ok());
    }
}
