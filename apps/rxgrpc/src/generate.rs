//! # Generation Pipeline
//!
//! End-to-end orchestration of a generation run:
//!
//! 1. compile schema sources into the intermediate static module and the
//!    JSON schema descriptor;
//! 2. parse both, then run the five rewrite passes over the module;
//! 3. project a typed declaration skeleton from the rewritten module;
//! 4. normalize the skeleton into the final declaration text.
//!
//! All intermediates live in a per-run temporary directory with fixed file
//! names, so the randomized directory name never leaks into the output and
//! identical schema input produces identical declaration text.
//!
//! Collaborator invocations and file I/O are awaited strictly in sequence;
//! nothing in a single run executes concurrently.

use std::path::PathBuf;

use crate::compiler::SchemaCompiler;
use crate::declarations;
use crate::descriptor::DescriptorTree;
use crate::error::Result;
use crate::rewrite::{self, Module};

const MODULE_FILE: &str = "generated.js";
const DESCRIPTOR_FILE: &str = "descriptor.json";
const REWRITTEN_FILE: &str = "rewritten.js";
const DECLARATIONS_FILE: &str = "generated.d.ts";

/// Generate declaration text from schema source files.
pub async fn build_declarations(
    compiler: &dyn SchemaCompiler,
    protos: &[PathBuf],
) -> Result<String> {
    let dir = tempfile::tempdir()?;

    let module_path = dir.path().join(MODULE_FILE);
    let descriptor_path = dir.path().join(DESCRIPTOR_FILE);
    compiler.generate_module(protos, &module_path).await?;
    compiler
        .generate_descriptor(protos, &descriptor_path)
        .await?;

    let module_source = tokio::fs::read_to_string(&module_path).await?;
    let descriptor_source = tokio::fs::read_to_string(&descriptor_path).await?;
    let tree = DescriptorTree::from_json(&descriptor_source)?;
    tracing::debug!(services = tree.services().count(), "parsed schema descriptor");

    let rewritten = rewrite::apply(&Module::parse(&module_source), &tree)?;

    let rewritten_path = dir.path().join(REWRITTEN_FILE);
    tokio::fs::write(&rewritten_path, rewritten.render()).await?;

    let declarations_path = dir.path().join(DECLARATIONS_FILE);
    compiler
        .generate_declarations(&rewritten_path, &declarations_path)
        .await?;
    let skeleton = tokio::fs::read_to_string(&declarations_path).await?;

    Ok(declarations::normalize(&skeleton))
}

/// Generate declaration text from in-memory schema source text.
///
/// Sources are written to temporary files and handed to the same pipeline
/// as [`build_declarations`].
pub async fn build_declarations_from_sources(
    compiler: &dyn SchemaCompiler,
    sources: &[String],
) -> Result<String> {
    let dir = tempfile::tempdir()?;
    let mut protos = Vec::with_capacity(sources.len());
    for (index, source) in sources.iter().enumerate() {
        let path = dir.path().join(format!("schema-{index}.proto"));
        tokio::fs::write(&path, source).await?;
        protos.push(path);
    }
    build_declarations(compiler, &protos).await
}
