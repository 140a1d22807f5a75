//! Error taxonomy for the generation pipeline.
//!
//! Three concerns are kept apart:
//!
//! - [`SchemaError`]: the schema itself is unusable (unresolvable type
//!   reference, invalid descriptor). Always fatal for the whole run.
//! - [`AnnotationError`]: a documentation annotation on a generated
//!   declaration is missing or malformed. Non-fatal for individual
//!   declarations (the rewrite passes skip them), fatal only when it blocks
//!   namespace-name derivation.
//! - [`CollaboratorError`]: invoking the external schema compiler failed.
//!   Fatal, with the collaborator's own message preserved.
//!
//! Adapter-side failures never appear here; they are contained per call and
//! delivered as `tonic::Status` on the transport's error channel.

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// The schema could not be resolved into a usable descriptor tree.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A type referenced by a field or method does not exist in the schema.
    #[error("unresolvable type reference '{reference}' in scope '{scope}'")]
    UnresolvedType {
        /// The type name as written in the schema.
        reference: String,
        /// The fully qualified scope the reference was resolved from.
        scope: String,
    },

    /// The collaborator's JSON descriptor could not be parsed.
    #[error("invalid schema descriptor: {message}")]
    InvalidDescriptor {
        /// Parser diagnostic.
        message: String,
    },
}

/// A documentation annotation expected on a generated declaration is
/// missing or malformed.
#[derive(Debug, Error)]
pub enum AnnotationError {
    /// An expected tag was not present.
    #[error("missing documentation tag '@{tag}' on {context}")]
    MissingTag {
        /// The tag name, without the leading `@`.
        tag: &'static str,
        /// Description of the declaration the tag was expected on.
        context: String,
    },
}

/// The external schema compiler could not be invoked or reported failure.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// The compiler executable could not be launched at all.
    #[error("failed to launch schema compiler '{command}': {source}")]
    Launch {
        /// The command that was attempted.
        command: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// The compiler ran but exited unsuccessfully.
    #[error("schema compiler '{command}' failed ({status}): {stderr}")]
    Failed {
        /// The command that was invoked.
        command: String,
        /// The process exit status.
        status: ExitStatus,
        /// Captured standard error output.
        stderr: String,
    },

    /// The compiler reported success but did not produce the requested file.
    #[error("schema compiler '{command}' produced no output at {}", path.display())]
    MissingOutput {
        /// The command that was invoked.
        command: String,
        /// The expected output path.
        path: PathBuf,
    },
}

/// Umbrella error for a generation run.
///
/// Every pipeline failure bubbles up as one of these and terminates the
/// process with a non-zero exit; there is no partial output.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// Schema resolution failed.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A fatal annotation failure (namespace-name derivation).
    #[error(transparent)]
    Annotation(#[from] AnnotationError),

    /// External compiler invocation failed.
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    /// Reading or writing an intermediate or output file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias used throughout the generation pipeline.
pub type Result<T, E = GenerateError> = std::result::Result<T, E>;
