//! Command-line interface for the declaration generator.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{CommandFactory, Parser};

use crate::compiler::CommandCompiler;
use crate::error::Result;
use crate::generate;

/// Generate reactive TypeScript declarations from protobuf schemas.
#[derive(Parser, Debug)]
#[command(name = "rxgrpc", version, about)]
pub struct Cli {
    /// Schema source files.
    pub protos: Vec<PathBuf>,

    /// Write declarations to this file instead of standard output.
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

/// Run one generation pass for the parsed arguments.
///
/// No schema sources is a usage error: the help text is printed and the
/// failure exit code returned without attempting generation.
pub async fn run(cli: Cli) -> Result<ExitCode> {
    if cli.protos.is_empty() {
        Cli::command().print_help()?;
        return Ok(ExitCode::FAILURE);
    }

    let compiler = CommandCompiler::from_env();
    let declarations = generate::build_declarations(&compiler, &cli.protos).await?;

    match &cli.out {
        Some(path) => {
            tokio::fs::write(path, &declarations).await?;
            tracing::info!(path = %path.display(), "wrote declarations");
        }
        None => print!("{declarations}"),
    }
    Ok(ExitCode::SUCCESS)
}
