//! `yasnc`: lexer, parser, module resolver, type checker, and bytecode
//! compiler for the YASN language.

pub mod ast;
pub mod compiler;
pub mod config;
pub mod lexer;
pub mod parser;
pub mod resolver;
pub mod schema;
pub mod token;
pub mod typechecker;
pub mod types;

use std::path::Path;

use yasn_core::{Diagnostic, ProgramBC};

/// Runs the full pipeline (resolve → check → compile) for `entry_path` and
/// returns the resulting bytecode program.
pub fn build(entry_path: &Path) -> Result<ProgramBC, Diagnostic> {
    let module = resolver::resolve(entry_path)?;
    typechecker::check(&module)?;
    Ok(compiler::compile(&module))
}
