//! `yasnc`: compiles a single YASN source tree to a `.ybc` bytecode file.
//!
//! This binary exists to exercise the compiler pipeline end to end; the
//! richer `yasn build`/`run`/`bundle` surface lives in `yasn-cli`.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing::info;

#[derive(Parser)]
#[command(name = "yasnc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "YASN compiler - compile a source tree to .ybc bytecode")]
struct Cli {
    /// Entry source file
    input: PathBuf,

    /// Output .ybc path (defaults to input filename with a .ybc extension)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    let output = cli.output.unwrap_or_else(|| cli.input.with_extension("ybc"));

    match yasnc::build(&cli.input) {
        Ok(program) => {
            if let Err(e) = program.check_invariants() {
                eprintln!("internal error: compiled program violates invariants: {e}");
                process::exit(1);
            }
            let bytes = yasn_core::encode_bytecode(&program);
            if let Err(e) = std::fs::write(&output, &bytes) {
                eprintln!("error writing {}: {e}", output.display());
                process::exit(1);
            }
            info!(input = %cli.input.display(), output = %output.display(), "compiled");
            println!("Compiled {} -> {}", cli.input.display(), output.display());
        }
        Err(diag) => {
            eprintln!("{diag}");
            process::exit(1);
        }
    }
}
