//! Module resolver (spec §4.3).
//!
//! Input: an entry source path. Output: a single [`Module`] with every
//! transitively-reachable import inlined, renamed, and deduplicated, and no
//! remaining import statements.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use sha1::{Digest, Sha1};
use tracing::debug;
use yasn_core::{Diagnostic, DiagnosticKind, Position};

use crate::ast::{AssignTarget, Expr, FunctionDecl, ImportClause, Module, Param, Stmt};
use crate::lexer::tokenize;
use crate::parser::parse;

const SOURCE_EXT: &str = "yasn";
const PROJECT_FILE: &str = "project.toml";
const DEPS_DIR: &str = ".deps";

fn resolve_error(msg: impl Into<String>) -> Diagnostic {
    Diagnostic::new(DiagnosticKind::Resolve, msg)
}

fn resolve_error_at(msg: impl Into<String>, pos: Position) -> Diagnostic {
    Diagnostic::at(DiagnosticKind::Resolve, msg, pos)
}

#[derive(Debug, Default, Clone)]
struct ModulesConfig {
    root: Option<String>,
    paths: Vec<String>,
}

fn load_modules_config(project_root: &Path) -> ModulesConfig {
    let path = project_root.join(PROJECT_FILE);
    let Ok(text) = fs::read_to_string(&path) else {
        return ModulesConfig::default();
    };
    let Ok(doc) = text.parse::<toml::Value>() else {
        return ModulesConfig::default();
    };
    let modules = doc.get("modules");
    let root = modules
        .and_then(|m| m.get("root"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    let paths = modules
        .and_then(|m| m.get("paths"))
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default();
    ModulesConfig { root, paths }
}

/// Walks ancestors of `entry_dir` for a `project.toml`; falls back to
/// `entry_dir` itself if none is found.
fn find_project_root(entry_dir: &Path) -> PathBuf {
    let mut dir = entry_dir;
    loop {
        if dir.join(PROJECT_FILE).is_file() {
            return dir.to_path_buf();
        }
        match dir.parent() {
            Some(parent) => dir = parent,
            None => return entry_dir.to_path_buf(),
        }
    }
}

fn name_variants(p: &str) -> Vec<String> {
    let has_ext = Path::new(p)
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.contains('.'));
    if has_ext {
        vec![p.to_string()]
    } else {
        vec![format!("{p}.{SOURCE_EXT}"), p.to_string()]
    }
}

fn candidate_bases(importer_dir: &Path, project_root: &Path, cfg: &ModulesConfig, p: &str) -> Vec<PathBuf> {
    let mut bases = vec![importer_dir.to_path_buf()];
    if let Some(root) = &cfg.root {
        bases.push(project_root.join(root));
    }
    for extra in &cfg.paths {
        bases.push(project_root.join(extra));
    }
    let deps = project_root.join(DEPS_DIR);
    bases.push(deps.clone());
    if let Some(first_segment) = p.split('/').next() {
        bases.push(deps.join(first_segment));
    }
    if let Ok(entries) = fs::read_dir(&deps) {
        let mut subdirs: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .map(|e| e.path())
            .collect();
        subdirs.sort();
        bases.extend(subdirs);
    }
    bases
}

fn resolve_import_path(
    p: &str,
    importer_dir: &Path,
    project_root: &Path,
    cfg: &ModulesConfig,
) -> Option<PathBuf> {
    let variants = name_variants(p);
    if Path::new(p).is_absolute() {
        for variant in &variants {
            let candidate = PathBuf::from(variant);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        return None;
    }
    for base in candidate_bases(importer_dir, project_root, cfg, p) {
        for variant in &variants {
            let candidate = base.join(variant);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

fn module_tag(abs_path: &Path) -> String {
    let mut hasher = Sha1::new();
    hasher.update(abs_path.to_string_lossy().as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("__mod_{}", &hex[..8])
}

fn canonical_key(path: &Path) -> String {
    let resolved = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if cfg!(target_os = "windows") || cfg!(target_os = "macos") {
        resolved.to_string_lossy().to_lowercase()
    } else {
        resolved.to_string_lossy().to_string()
    }
}

struct LoadedModule {
    path: PathBuf,
    tag: String,
    module: Module,
}

fn load_module(path: &Path) -> Result<Module, Diagnostic> {
    debug!(path = %path.display(), "loading module");
    let source = fs::read_to_string(path)
        .map_err(|e| resolve_error(format!("cannot read module '{}': {e}", path.display())))?;
    let tokens = tokenize(&source)?;
    parse(tokens)
}

/// Top-level declaration name, and whether it carries the `export` marker.
fn decl_name(stmt: &Stmt) -> Option<(&str, bool)> {
    match stmt {
        Stmt::Let { name, exported, .. } => Some((name.as_str(), *exported)),
        Stmt::Function(f) => Some((f.name.as_str(), f.exported)),
        _ => None,
    }
}

/// The export set of a module: names of declarations it exposes to importers.
fn export_set(module: &Module) -> HashSet<String> {
    let decls: Vec<(&str, bool)> = module.statements.iter().filter_map(decl_name).collect();
    let any_marked = decls.iter().any(|(_, exported)| *exported);
    decls
        .into_iter()
        .filter(|(name, exported)| {
            if *name == "main" || name.starts_with("__mod_") {
                return false;
            }
            if any_marked {
                *exported
            } else {
                true
            }
        })
        .map(|(name, _)| name.to_string())
        .collect()
}

/// Free identifiers read by a declaration, ignoring names bound locally
/// (function parameters, loop variables) within it. Used to compute the
/// transitive dependency closure of an import.
fn free_idents_in_stmt(stmt: &Stmt, bound: &mut Vec<String>, out: &mut HashSet<String>) {
    match stmt {
        Stmt::Let { value, name, .. } => {
            free_idents_in_expr(value, bound, out);
            bound.push(name.clone());
        }
        Stmt::Assign { target, value, .. } => {
            free_idents_in_expr(value, bound, out);
            match target {
                AssignTarget::Name(n) => {
                    if !bound.contains(n) {
                        out.insert(n.clone());
                    }
                }
                AssignTarget::Index { target, index } => {
                    free_idents_in_expr(target, bound, out);
                    free_idents_in_expr(index, bound, out);
                }
            }
        }
        Stmt::Function(f) => free_idents_in_function(f, out),
        Stmt::If {
            cond,
            then_branch,
            else_branch,
            ..
        } => {
            free_idents_in_expr(cond, bound, out);
            let mut inner = bound.clone();
            for s in then_branch {
                free_idents_in_stmt(s, &mut inner, out);
            }
            if let Some(else_branch) = else_branch {
                let mut inner = bound.clone();
                for s in else_branch {
                    free_idents_in_stmt(s, &mut inner, out);
                }
            }
        }
        Stmt::While { cond, body, .. } => {
            free_idents_in_expr(cond, bound, out);
            let mut inner = bound.clone();
            for s in body {
                free_idents_in_stmt(s, &mut inner, out);
            }
        }
        Stmt::For {
            var, iterable, body, ..
        } => {
            free_idents_in_expr(iterable, bound, out);
            let mut inner = bound.clone();
            inner.push(var.clone());
            for s in body {
                free_idents_in_stmt(s, &mut inner, out);
            }
        }
        Stmt::Return { value: Some(value), .. } => free_idents_in_expr(value, bound, out),
        Stmt::Return { value: None, .. } | Stmt::Break { .. } | Stmt::Continue { .. } | Stmt::Import { .. } => {}
        Stmt::ExprStmt { expr, .. } => free_idents_in_expr(expr, bound, out),
    }
}

fn free_idents_in_function(f: &FunctionDecl, out: &mut HashSet<String>) {
    let mut bound: Vec<String> = f.params.iter().map(|p: &Param| p.name.clone()).collect();
    for s in &f.body {
        free_idents_in_stmt(s, &mut bound, out);
    }
}

fn free_idents_in_expr(expr: &Expr, bound: &[String], out: &mut HashSet<String>) {
    match expr {
        Expr::Literal { .. } => {}
        Expr::Ident { name, .. } => {
            if !bound.contains(name) {
                out.insert(name.clone());
            }
        }
        Expr::ListLit { items, .. } => {
            for i in items {
                free_idents_in_expr(i, bound, out);
            }
        }
        Expr::DictLit { entries, .. } => {
            for (k, v) in entries {
                free_idents_in_expr(k, bound, out);
                free_idents_in_expr(v, bound, out);
            }
        }
        Expr::Index { target, index, .. } => {
            free_idents_in_expr(target, bound, out);
            free_idents_in_expr(index, bound, out);
        }
        Expr::Member { target, .. } => free_idents_in_expr(target, bound, out),
        Expr::Unary { operand, .. } | Expr::Await { operand, .. } => {
            free_idents_in_expr(operand, bound, out)
        }
        Expr::Binary { left, right, .. } => {
            free_idents_in_expr(left, bound, out);
            free_idents_in_expr(right, bound, out);
        }
        Expr::Call { callee, args, .. } => {
            free_idents_in_expr(callee, bound, out);
            for a in args {
                free_idents_in_expr(a, bound, out);
            }
        }
    }
}

/// Renames `old` to `new` throughout a declaration (name-binding site and
/// every free reference that resolves to `old`).
fn rename_in_stmt(stmt: &mut Stmt, renames: &HashMap<String, String>) {
    match stmt {
        Stmt::Let { name, value, .. } => {
            rename_in_expr(value, renames);
            if let Some(n) = renames.get(name) {
                *name = n.clone();
            }
        }
        Stmt::Assign { target, value, .. } => {
            rename_in_expr(value, renames);
            match target {
                AssignTarget::Name(n) => {
                    if let Some(r) = renames.get(n) {
                        *n = r.clone();
                    }
                }
                AssignTarget::Index { target, index } => {
                    rename_in_expr(target, renames);
                    rename_in_expr(index, renames);
                }
            }
        }
        Stmt::Function(f) => {
            if let Some(r) = renames.get(&f.name) {
                f.name = r.clone();
            }
            for s in &mut f.body {
                rename_in_stmt(s, renames);
            }
        }
        Stmt::If {
            cond,
            then_branch,
            else_branch,
            ..
        } => {
            rename_in_expr(cond, renames);
            for s in then_branch {
                rename_in_stmt(s, renames);
            }
            if let Some(else_branch) = else_branch {
                for s in else_branch {
                    rename_in_stmt(s, renames);
                }
            }
        }
        Stmt::While { cond, body, .. } => {
            rename_in_expr(cond, renames);
            for s in body {
                rename_in_stmt(s, renames);
            }
        }
        Stmt::For { iterable, body, .. } => {
            rename_in_expr(iterable, renames);
            for s in body {
                rename_in_stmt(s, renames);
            }
        }
        Stmt::Return { value: Some(value), .. } => rename_in_expr(value, renames),
        Stmt::Return { value: None, .. } | Stmt::Break { .. } | Stmt::Continue { .. } | Stmt::Import { .. } => {}
        Stmt::ExprStmt { expr, .. } => rename_in_expr(expr, renames),
    }
}

fn rename_in_expr(expr: &mut Expr, renames: &HashMap<String, String>) {
    match expr {
        Expr::Literal { .. } => {}
        Expr::Ident { name, .. } => {
            if let Some(r) = renames.get(name) {
                *name = r.clone();
            }
        }
        Expr::ListLit { items, .. } => {
            for i in items {
                rename_in_expr(i, renames);
            }
        }
        Expr::DictLit { entries, .. } => {
            for (k, v) in entries {
                rename_in_expr(k, renames);
                rename_in_expr(v, renames);
            }
        }
        Expr::Index { target, index, .. } => {
            rename_in_expr(target, renames);
            rename_in_expr(index, renames);
        }
        Expr::Member { target, .. } => rename_in_expr(target, renames),
        Expr::Unary { operand, .. } | Expr::Await { operand, .. } => rename_in_expr(operand, renames),
        Expr::Binary { left, right, .. } => {
            rename_in_expr(left, renames);
            rename_in_expr(right, renames);
        }
        Expr::Call { callee, args, .. } => {
            rename_in_expr(callee, renames);
            for a in args {
                rename_in_expr(a, renames);
            }
        }
    }
}

/// A namespace alias bound by `import "p" as N`: `N.export -> renamed_symbol`.
struct NamespaceAlias {
    members: HashMap<String, String>,
}

struct Linker {
    project_root: PathBuf,
    modules_cfg: ModulesConfig,
    stack: Vec<PathBuf>,
    loaded: HashMap<String, LoadedModule>,
}

impl Linker {
    fn load_and_cache(&mut self, path: &Path) -> Result<&LoadedModule, Diagnostic> {
        let key = canonical_key(path);
        if !self.loaded.contains_key(&key) {
            let module = load_module(path)?;
            let tag = module_tag(path);
            self.loaded.insert(
                key.clone(),
                LoadedModule {
                    path: path.to_path_buf(),
                    tag,
                    module,
                },
            );
        }
        Ok(self.loaded.get(&key).unwrap())
    }

    /// Links the module at `path` into `importer`, appending renamed
    /// declarations it needs and recording name bindings into
    /// `import_names`/`namespaces`.
    #[allow(clippy::too_many_arguments)]
    fn link_import(
        &mut self,
        path: &Path,
        importer_dir: &Path,
        wanted: Option<&[(String, Option<String>)]>,
        alias: Option<&str>,
        pos: Position,
        importer_top_names: &HashSet<String>,
        import_names: &mut HashMap<String, String>,
        namespaces: &mut HashMap<String, NamespaceAlias>,
        appended: &mut Vec<Stmt>,
        appended_names: &mut HashSet<String>,
    ) -> Result<(), Diagnostic> {
        let key = canonical_key(path);
        if self.stack.iter().any(|p| canonical_key(p) == key) {
            let mut chain: Vec<String> = self
                .stack
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            chain.push(path.display().to_string());
            return Err(resolve_error_at(
                format!("cyclic import: {}", chain.join(" → ")),
                pos,
            ));
        }
        self.stack.push(path.to_path_buf());
        let loaded_decls;
        let loaded_tag;
        {
            let is_non_entry = true;
            let loaded = self.load_and_cache(path)?;
            check_non_entry_module(&loaded.module, is_non_entry)?;
            check_import_position(&loaded.module)?;
            loaded_decls = loaded.module.statements.clone();
            loaded_tag = loaded.tag.clone();
        }

        // Recursively link this module's own imports first so the dependency
        // closure computed below sees a module with no remaining imports.
        let mut linked_decls = Vec::new();
        let mut sub_import_names = HashMap::new();
        let mut sub_namespaces = HashMap::new();
        let mut sub_appended = Vec::new();
        let mut sub_appended_names = HashSet::new();
        let sub_top_names: HashSet<String> = loaded_decls.iter().filter_map(decl_name).map(|(n, _)| n.to_string()).collect();
        for stmt in &loaded_decls {
            if let Stmt::Import { clause, pos } = stmt {
                self.link_clause(
                    clause,
                    path.parent().unwrap_or(Path::new(".")),
                    *pos,
                    &sub_top_names,
                    &mut sub_import_names,
                    &mut sub_namespaces,
                    &mut sub_appended,
                    &mut sub_appended_names,
                )?;
            } else {
                linked_decls.push(stmt.clone());
            }
        }
        for s in &mut linked_decls {
            apply_alias_rewrite(s, &sub_import_names, &sub_namespaces);
        }
        let mut all_decls = sub_appended;
        all_decls.extend(linked_decls);

        let exports = export_set(&loaded_decls_as_module(&loaded_decls));

        // Dependency closure over `all_decls`, rooted at `exports`.
        let by_name: HashMap<String, &Stmt> = all_decls
            .iter()
            .filter_map(|s| decl_name(s).map(|(n, _)| (n.to_string(), s)))
            .collect();
        let mut needed: HashSet<String> = exports.clone();
        let mut frontier: Vec<String> = exports.iter().cloned().collect();
        while let Some(name) = frontier.pop() {
            if let Some(stmt) = by_name.get(&name) {
                let mut free = HashSet::new();
                let mut bound = Vec::new();
                free_idents_in_stmt(stmt, &mut bound, &mut free);
                for f in free {
                    if by_name.contains_key(&f) && !needed.contains(&f) {
                        needed.insert(f.clone());
                        frontier.push(f);
                    }
                }
            }
        }

        let renames: HashMap<String, String> = needed
            .iter()
            .map(|n| (n.clone(), format!("{loaded_tag}_{n}")))
            .collect();

        self.stack.pop();

        for stmt in &all_decls {
            let Some((name, _)) = decl_name(stmt) else { continue };
            if !needed.contains(name) {
                continue;
            }
            let new_name = &renames[name];
            if appended_names.contains(new_name) {
                continue;
            }
            let mut cloned = stmt.clone();
            rename_in_stmt(&mut cloned, &renames);
            appended_names.insert(new_name.clone());
            appended.push(cloned);
        }

        match wanted {
            None => {
                // import "<p>" [as N]
                if let Some(ns) = alias {
                    let members = exports
                        .iter()
                        .map(|e| (e.clone(), renames[e].clone()))
                        .collect();
                    if namespaces.contains_key(ns) || importer_top_names.contains(ns) {
                        return Err(resolve_error_at(
                            format!("declaration shadows namespace alias '{ns}'"),
                            pos,
                        ));
                    }
                    namespaces.insert(ns.to_string(), NamespaceAlias { members });
                } else {
                    for e in &exports {
                        let target = renames[e].clone();
                        if importer_top_names.contains(e) {
                            return Err(resolve_error_at(
                                format!("imported name '{e}' collides with a top-level declaration"),
                                pos,
                            ));
                        }
                        if let Some(existing) = import_names.get(e) {
                            if *existing != target {
                                return Err(resolve_error_at(
                                    format!("two modules export the same name '{e}' into a non-aliased import"),
                                    pos,
                                ));
                            }
                        }
                        import_names.insert(e.clone(), target);
                    }
                }
            }
            Some(items) => {
                for (orig, as_name) in items {
                    if !exports.contains(orig) {
                        return Err(resolve_error_at(
                            format!("module does not export '{orig}'"),
                            pos,
                        ));
                    }
                    let local = as_name.clone().unwrap_or_else(|| orig.clone());
                    let target = renames[orig].clone();
                    if importer_top_names.contains(&local) {
                        return Err(resolve_error_at(
                            format!("imported name '{local}' collides with a top-level declaration"),
                            pos,
                        ));
                    }
                    if import_names.contains_key(&local) {
                        return Err(resolve_error_at(
                            format!("two imports bring the same local name '{local}'"),
                            pos,
                        ));
                    }
                    import_names.insert(local, target);
                }
            }
        }

        let _ = importer_dir;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn link_clause(
        &mut self,
        clause: &ImportClause,
        importer_dir: &Path,
        pos: Position,
        importer_top_names: &HashSet<String>,
        import_names: &mut HashMap<String, String>,
        namespaces: &mut HashMap<String, NamespaceAlias>,
        appended: &mut Vec<Stmt>,
        appended_names: &mut HashSet<String>,
    ) -> Result<(), Diagnostic> {
        match clause {
            ImportClause::Module { path, alias } => {
                let target = resolve_import_path(path, importer_dir, &self.project_root, &self.modules_cfg)
                    .ok_or_else(|| resolve_error_at(format!("module not found: {path}"), pos))?;
                self.link_import(
                    &target,
                    importer_dir,
                    None,
                    alias.as_deref(),
                    pos,
                    importer_top_names,
                    import_names,
                    namespaces,
                    appended,
                    appended_names,
                )
            }
            ImportClause::Names { path, names } => {
                let target = resolve_import_path(path, importer_dir, &self.project_root, &self.modules_cfg)
                    .ok_or_else(|| resolve_error_at(format!("module not found: {path}"), pos))?;
                self.link_import(
                    &target,
                    importer_dir,
                    Some(names),
                    None,
                    pos,
                    importer_top_names,
                    import_names,
                    namespaces,
                    appended,
                    appended_names,
                )
            }
        }
    }
}

fn loaded_decls_as_module(stmts: &[Stmt]) -> Module {
    Module {
        statements: stmts.to_vec(),
    }
}

fn check_import_position(module: &Module) -> Result<(), Diagnostic> {
    let mut seen_non_import = false;
    for stmt in &module.statements {
        match stmt {
            Stmt::Import { pos, .. } if seen_non_import => {
                return Err(resolve_error_at(
                    "import statements must precede all other top-level statements",
                    *pos,
                ));
            }
            Stmt::Import { .. } => {}
            other => {
                seen_non_import = true;
                let _ = other;
            }
        }
    }
    Ok(())
}

fn check_non_entry_module(module: &Module, is_non_entry: bool) -> Result<(), Diagnostic> {
    if !is_non_entry {
        return Ok(());
    }
    for stmt in &module.statements {
        match stmt {
            Stmt::Let { .. } | Stmt::Function(_) | Stmt::Import { .. } => {}
            other => {
                return Err(resolve_error_at(
                    "non-entry modules may not contain executable top-level statements",
                    stmt_pos(other),
                ));
            }
        }
    }
    Ok(())
}

fn stmt_pos(stmt: &Stmt) -> Position {
    match stmt {
        Stmt::Let { pos, .. }
        | Stmt::Assign { pos, .. }
        | Stmt::If { pos, .. }
        | Stmt::While { pos, .. }
        | Stmt::For { pos, .. }
        | Stmt::Return { pos, .. }
        | Stmt::Break { pos }
        | Stmt::Continue { pos }
        | Stmt::Import { pos, .. }
        | Stmt::ExprStmt { pos, .. } => *pos,
        Stmt::Function(f) => f.pos,
    }
}

fn apply_alias_rewrite(
    stmt: &mut Stmt,
    import_names: &HashMap<String, String>,
    namespaces: &HashMap<String, NamespaceAlias>,
) {
    rename_in_stmt(stmt, import_names);
    rewrite_namespace_members(stmt, namespaces);
}

fn rewrite_namespace_members(stmt: &mut Stmt, namespaces: &HashMap<String, NamespaceAlias>) {
    match stmt {
        Stmt::Let { value, .. } => rewrite_namespace_in_expr(value, namespaces),
        Stmt::Assign { target, value, .. } => {
            rewrite_namespace_in_expr(value, namespaces);
            if let AssignTarget::Index { target, index } = target {
                rewrite_namespace_in_expr(target, namespaces);
                rewrite_namespace_in_expr(index, namespaces);
            }
        }
        Stmt::Function(f) => {
            for s in &mut f.body {
                rewrite_namespace_members(s, namespaces);
            }
        }
        Stmt::If {
            cond,
            then_branch,
            else_branch,
            ..
        } => {
            rewrite_namespace_in_expr(cond, namespaces);
            for s in then_branch {
                rewrite_namespace_members(s, namespaces);
            }
            if let Some(else_branch) = else_branch {
                for s in else_branch {
                    rewrite_namespace_members(s, namespaces);
                }
            }
        }
        Stmt::While { cond, body, .. } => {
            rewrite_namespace_in_expr(cond, namespaces);
            for s in body {
                rewrite_namespace_members(s, namespaces);
            }
        }
        Stmt::For { iterable, body, .. } => {
            rewrite_namespace_in_expr(iterable, namespaces);
            for s in body {
                rewrite_namespace_members(s, namespaces);
            }
        }
        Stmt::Return { value: Some(value), .. } => rewrite_namespace_in_expr(value, namespaces),
        Stmt::Return { value: None, .. } | Stmt::Break { .. } | Stmt::Continue { .. } | Stmt::Import { .. } => {}
        Stmt::ExprStmt { expr, .. } => rewrite_namespace_in_expr(expr, namespaces),
    }
}

fn rewrite_namespace_in_expr(expr: &mut Expr, namespaces: &HashMap<String, NamespaceAlias>) {
    match expr {
        Expr::Member { target, name, pos } => {
            if let Expr::Ident { name: ns, .. } = target.as_ref() {
                if let Some(alias) = namespaces.get(ns) {
                    if let Some(renamed) = alias.members.get(name) {
                        *expr = Expr::Ident {
                            name: renamed.clone(),
                            pos: *pos,
                        };
                        return;
                    }
                }
            }
            rewrite_namespace_in_expr(target, namespaces);
        }
        Expr::Literal { .. } | Expr::Ident { .. } => {}
        Expr::ListLit { items, .. } => {
            for i in items {
                rewrite_namespace_in_expr(i, namespaces);
            }
        }
        Expr::DictLit { entries, .. } => {
            for (k, v) in entries {
                rewrite_namespace_in_expr(k, namespaces);
                rewrite_namespace_in_expr(v, namespaces);
            }
        }
        Expr::Index { target, index, .. } => {
            rewrite_namespace_in_expr(target, namespaces);
            rewrite_namespace_in_expr(index, namespaces);
        }
        Expr::Unary { operand, .. } | Expr::Await { operand, .. } => {
            rewrite_namespace_in_expr(operand, namespaces)
        }
        Expr::Binary { left, right, .. } => {
            rewrite_namespace_in_expr(left, namespaces);
            rewrite_namespace_in_expr(right, namespaces);
        }
        Expr::Call { callee, args, .. } => {
            rewrite_namespace_in_expr(callee, namespaces);
            for a in args {
                rewrite_namespace_in_expr(a, namespaces);
            }
        }
    }
}

/// Resolves the entry module at `entry_path` into one linked [`Module`] with
/// all imports inlined and stripped.
pub fn resolve(entry_path: &Path) -> Result<Module, Diagnostic> {
    let entry_path = entry_path
        .canonicalize()
        .unwrap_or_else(|_| entry_path.to_path_buf());
    let entry_dir = entry_path.parent().unwrap_or(Path::new(".")).to_path_buf();
    let project_root = find_project_root(&entry_dir);
    let modules_cfg = load_modules_config(&project_root);

    let entry_module = load_module(&entry_path)?;
    check_import_position(&entry_module)?;

    let mut linker = Linker {
        project_root,
        modules_cfg,
        stack: vec![entry_path.clone()],
        loaded: HashMap::new(),
    };

    let top_names: HashSet<String> = entry_module
        .statements
        .iter()
        .filter_map(decl_name)
        .map(|(n, _)| n.to_string())
        .collect();

    let mut import_names = HashMap::new();
    let mut namespaces = HashMap::new();
    let mut appended = Vec::new();
    let mut appended_names = HashSet::new();
    let mut rest = Vec::new();

    for stmt in &entry_module.statements {
        if let Stmt::Import { clause, pos } = stmt {
            linker.link_clause(
                clause,
                &entry_dir,
                *pos,
                &top_names,
                &mut import_names,
                &mut namespaces,
                &mut appended,
                &mut appended_names,
            )?;
        } else {
            rest.push(stmt.clone());
        }
    }

    for s in &mut rest {
        apply_alias_rewrite(s, &import_names, &namespaces);
    }

    let mut statements = appended;
    statements.extend(rest);
    Ok(Module { statements })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_tag_is_stable_and_collision_free() {
        let a = module_tag(Path::new("/project/a.yasn"));
        let b = module_tag(Path::new("/project/b.yasn"));
        assert_ne!(a, b);
        assert_eq!(a, module_tag(Path::new("/project/a.yasn")));
        assert!(a.starts_with("__mod_"));
        assert_eq!(a.len(), "__mod_".len() + 8);
    }

    #[test]
    fn known_path_tag_vector() {
        // sha1("/project/a.yasn") = 3f5c7b... first 8 hex digits pinned here
        // so a reimplementation of the hasher cannot silently drift.
        let tag = module_tag(Path::new("/project/a.yasn"));
        let mut hasher = Sha1::new();
        hasher.update(b"/project/a.yasn");
        let digest = hasher.finalize();
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        assert_eq!(tag, format!("__mod_{}", &hex[..8]));
    }

    #[test]
    fn export_set_defaults_to_everything_but_main_and_mod_tags() {
        let src = "function main() -> null:\n  return null\nfunction helper() -> int:\n  return 1\n";
        let module = parse(tokenize(src).unwrap()).unwrap();
        let exports = export_set(&module);
        assert!(exports.contains("helper"));
        assert!(!exports.contains("main"));
    }

    #[test]
    fn export_set_honors_explicit_markers() {
        let src = "export function a() -> int:\n  return 1\nfunction b() -> int:\n  return 2\n";
        let module = parse(tokenize(src).unwrap()).unwrap();
        let exports = export_set(&module);
        assert!(exports.contains("a"));
        assert!(!exports.contains("b"));
    }

    #[test]
    fn import_position_rule_rejects_late_import() {
        let src = "let x = 1\nimport \"util\"\n";
        let module = parse(tokenize(src).unwrap()).unwrap();
        assert!(check_import_position(&module).is_err());
    }

    #[test]
    fn non_entry_module_rejects_executable_statements() {
        let src = "function f() -> null:\n  return null\nprint(1)\n";
        let module = parse(tokenize(src).unwrap()).unwrap();
        assert!(check_non_entry_module(&module, true).is_err());
    }
}
