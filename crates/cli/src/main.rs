//! `yasn`: the `build`/`run`/`bundle` dispatcher (spec §6.R).
//!
//! Deliberately thin — no dependency fetching, test discovery, lint, or
//! project scaffolding. Those stay with whatever external dispatcher wraps
//! this toolchain; this binary only does what the language runtime itself
//! needs: compile, execute, package.

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use yasn_core::{AppBundle, BundleMetadata, Diagnostic, ProgramBC, BUNDLE_VERSION_CURRENT};

#[derive(Parser)]
#[command(name = "yasn")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "YASN toolchain - build, run, and bundle .yasn programs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a .yasn source file to .ybc bytecode
    Build {
        /// Entry source file
        input: PathBuf,

        /// Output .ybc path (defaults to input filename with a .ybc extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Build (if given source) and execute a .yasn/.ybc/.yapp program
    Run {
        /// Entry source file, .ybc bytecode file, or .yapp bundle
        input: PathBuf,
    },

    /// Build, project the function schema, and write a .yapp application bundle
    Bundle {
        /// Entry source file
        input: PathBuf,

        /// Application name (required bundle metadata field)
        #[arg(long)]
        name: String,

        /// Output .yapp path (defaults to input filename with a .yapp extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output } => run_build(&input, output),
        Commands::Run { input } => run_run(&input),
        Commands::Bundle { input, name, output } => run_bundle(&input, &name, output),
    }
}

fn compile(input: &Path) -> Result<ProgramBC, Diagnostic> {
    yasnc::build(input)
}

fn run_build(input: &Path, output: Option<PathBuf>) {
    let output = output.unwrap_or_else(|| input.with_extension("ybc"));
    match compile(input) {
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
            info!(input = %input.display(), output = %output.display(), "compiled");
            println!("Compiled {} -> {}", input.display(), output.display());
        }
        Err(diag) => {
            eprintln!("{diag}");
            process::exit(1);
        }
    }
}

fn load_for_run(input: &Path) -> Result<ProgramBC, String> {
    if input.extension().and_then(|e| e.to_str()) == Some("yasn") {
        return compile(input).map_err(|e| e.to_string());
    }
    let bytes = std::fs::read(input).map_err(|e| format!("{}: {e}", input.display()))?;
    if input.extension().and_then(|e| e.to_str()) == Some("yapp") {
        yasn_core::decode_bundle(&bytes).map(|b| b.bytecode).map_err(|e| e.to_string())
    } else {
        yasn_core::decode_bytecode(&bytes).map_err(|e| e.to_string())
    }
}

fn run_run(input: &Path) {
    let program = match load_for_run(input) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };
    if let Err(e) = program.check_invariants() {
        eprintln!("internal error: program violates invariants: {e}");
        process::exit(1);
    }
    let mut vm = yasnvm::Vm::new(Arc::new(program));
    if let Err(err) = vm.run() {
        eprintln!("{err}");
        process::exit(1);
    }
}

fn run_bundle(input: &Path, name: &str, output: Option<PathBuf>) {
    let output = output.unwrap_or_else(|| input.with_extension("yapp"));

    let module = match yasnc::resolver::resolve(input) {
        Ok(m) => m,
        Err(diag) => {
            eprintln!("{diag}");
            process::exit(1);
        }
    };
    if let Err(diag) = yasnc::typechecker::check(&module) {
        eprintln!("{diag}");
        process::exit(1);
    }
    let bytecode = yasnc::compiler::compile(&module);
    if let Err(e) = bytecode.check_invariants() {
        eprintln!("internal error: compiled program violates invariants: {e}");
        process::exit(1);
    }
    let schema = yasnc::schema::project_module(&module);

    let bundle = AppBundle {
        metadata: BundleMetadata {
            name: name.to_string(),
            version: BUNDLE_VERSION_CURRENT,
            display_name: None,
            description: None,
            app_version: None,
            publisher: None,
            schema,
        },
        bytecode,
        ui_assets: Some(Vec::new()),
    };

    let bytes = yasn_core::encode_bundle(&bundle);
    if let Err(e) = std::fs::write(&output, &bytes) {
        eprintln!("error writing {}: {e}", output.display());
        process::exit(1);
    }
    info!(input = %input.display(), output = %output.display(), "bundled");
    println!("Bundled {} -> {}", input.display(), output.display());
}
