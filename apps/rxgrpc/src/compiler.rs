//! External schema compiler invocation.
//!
//! Generation shells out to the protobuf toolchain twice: once for the
//! intermediate static module plus JSON descriptor, and once to project a
//! typed declaration skeleton from the rewritten module. The commands are
//! resolvable through `RXGRPC_PBJS` and `RXGRPC_PBTS` so packaged or
//! locally linked toolchains can be substituted.
//!
//! [`SchemaCompiler`] is the seam the generation pipeline is written
//! against; tests install their own implementation instead of spawning
//! processes.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::CollaboratorError;

/// Environment override for the intermediate-module compiler command.
pub const PBJS_ENV: &str = "RXGRPC_PBJS";
/// Environment override for the declaration-skeleton compiler command.
pub const PBTS_ENV: &str = "RXGRPC_PBTS";

/// The external schema compiler surface the pipeline depends on.
#[async_trait]
pub trait SchemaCompiler: Send + Sync {
    /// Compile schema sources into an intermediate static module at `out`.
    async fn generate_module(&self, protos: &[PathBuf], out: &Path)
    -> Result<(), CollaboratorError>;

    /// Compile schema sources into a JSON schema descriptor at `out`.
    async fn generate_descriptor(
        &self,
        protos: &[PathBuf],
        out: &Path,
    ) -> Result<(), CollaboratorError>;

    /// Project a typed declaration skeleton for the module at `module`.
    async fn generate_declarations(
        &self,
        module: &Path,
        out: &Path,
    ) -> Result<(), CollaboratorError>;
}

/// [`SchemaCompiler`] backed by the `pbjs` and `pbts` commands.
#[derive(Debug, Clone)]
pub struct CommandCompiler {
    pbjs: String,
    pbts: String,
}

impl CommandCompiler {
    /// Resolve commands from the environment, falling back to `pbjs` and
    /// `pbts` on the search path.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            pbjs: std::env::var(PBJS_ENV).unwrap_or_else(|_| "pbjs".to_string()),
            pbts: std::env::var(PBTS_ENV).unwrap_or_else(|_| "pbts".to_string()),
        }
    }

    async fn run(command: &str, args: &[&str]) -> Result<(), CollaboratorError> {
        tracing::debug!(command, ?args, "invoking schema compiler");
        let output = Command::new(command)
            .args(args)
            .output()
            .await
            .map_err(|source| CollaboratorError::Launch {
                command: command.to_string(),
                source,
            })?;
        if !output.status.success() {
            return Err(CollaboratorError::Failed {
                command: command.to_string(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(())
    }

    async fn run_expecting(
        command: &str,
        args: &[&str],
        out: &Path,
    ) -> Result<(), CollaboratorError> {
        Self::run(command, args).await?;
        if !out.exists() {
            return Err(CollaboratorError::MissingOutput {
                command: command.to_string(),
                path: out.to_path_buf(),
            });
        }
        Ok(())
    }
}

impl Default for CommandCompiler {
    fn default() -> Self {
        Self::from_env()
    }
}

#[async_trait]
impl SchemaCompiler for CommandCompiler {
    async fn generate_module(
        &self,
        protos: &[PathBuf],
        out: &Path,
    ) -> Result<(), CollaboratorError> {
        let out_arg = out.to_string_lossy().into_owned();
        let mut args = vec![
            "--target",
            "static-module",
            "--wrap",
            "commonjs",
            "--keep-case",
            "--out",
            &out_arg,
        ];
        let protos: Vec<String> = protos
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        args.extend(protos.iter().map(String::as_str));
        Self::run_expecting(&self.pbjs, &args, out).await
    }

    async fn generate_descriptor(
        &self,
        protos: &[PathBuf],
        out: &Path,
    ) -> Result<(), CollaboratorError> {
        let out_arg = out.to_string_lossy().into_owned();
        let mut args = vec!["--target", "json", "--keep-case", "--out", &out_arg];
        let protos: Vec<String> = protos
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        args.extend(protos.iter().map(String::as_str));
        Self::run_expecting(&self.pbjs, &args, out).await
    }

    async fn generate_declarations(
        &self,
        module: &Path,
        out: &Path,
    ) -> Result<(), CollaboratorError> {
        let out_arg = out.to_string_lossy().into_owned();
        let module_arg = module.to_string_lossy().into_owned();
        let args = ["--out", out_arg.as_str(), module_arg.as_str()];
        Self::run_expecting(&self.pbts, &args, out).await
    }
}
