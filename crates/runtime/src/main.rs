//! `yasnvm`: runs a compiled `.ybc` bytecode file or `.yapp` bundle.
//!
//! This binary exists to exercise the VM end to end; the richer `yasn build`/
//! `run`/`bundle` surface lives in `yasn-cli`.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use yasnvm::error::RuntimeError;
use yasnvm::Vm;

#[derive(Parser)]
#[command(name = "yasnvm")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "YASN virtual machine - run a .ybc or .yapp program")]
struct Cli {
    /// Compiled .ybc or .yapp file
    input: PathBuf,

    /// Call a specific function instead of running __entry__
    #[arg(short, long)]
    call: Option<String>,
}

fn load_program(path: &std::path::Path) -> Result<yasn_core::ProgramBC, String> {
    let bytes = std::fs::read(path).map_err(|e| format!("{}: {e}", path.display()))?;
    let is_yapp = path.extension().and_then(|e| e.to_str()) == Some("yapp");
    if is_yapp {
        yasn_core::decode_bundle(&bytes)
            .map(|bundle| bundle.bytecode)
            .map_err(|e| e.to_string())
    } else {
        yasn_core::decode_bytecode(&bytes).map_err(|e| e.to_string())
    }
}

fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let program = match load_program(&cli.input) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error loading {}: {e}", cli.input.display());
            process::exit(1);
        }
    };
    if let Err(e) = program.check_invariants() {
        eprintln!("internal error: program violates invariants: {e}");
        process::exit(1);
    }

    let mut vm = Vm::new(Arc::new(program));
    let result: Result<yasnvm::Value, RuntimeError> = match &cli.call {
        None => vm.run(),
        Some(name) => vm.call_function(name, Vec::new(), false),
    };

    match result {
        Ok(_) => {
            info!(input = %cli.input.display(), "run complete");
        }
        Err(err) => {
            eprintln!("{err}");
            process::exit(1);
        }
    }
}
