// Allow unwrap/expect in tests - tests should panic on unexpected errors
// Allow test-specific patterns and pedantic lints in test code
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! rxgrpc - Reactive Declaration Generator and RPC Adapter
//!
//! Generates reactive TypeScript declarations from protobuf schemas and
//! bridges stream-shaped service code onto callback and event shaped RPC
//! transports.
//!
//! # Architecture
//!
//! Two halves share the schema descriptor model:
//!
//! - **Generation pipeline** (build time)
//!   - `compiler`: external schema compiler invocation (`pbjs`/`pbts`)
//!   - `descriptor`: JSON schema descriptor parsed into a queryable tree
//!   - `rewrite`: five passes over the intermediate generated module
//!   - `declarations`: normalization of the typed declaration skeleton
//!   - `generate`: end-to-end orchestration of one generation run
//!
//! - **Runtime adapter**
//!   - `adapter::transport`: the contract a transport binding implements
//!   - `adapter::server`: stream implementations wrapped for dispatch
//!   - `adapter::client`: stub calls exposed as shared streams

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Generation Pipeline
// =============================================================================

pub mod cli;
pub mod compiler;
pub mod declarations;
pub mod descriptor;
pub mod error;
pub mod generate;
pub mod rewrite;

// =============================================================================
// Runtime Adapter
// =============================================================================

pub mod adapter;

// =============================================================================
// Support
// =============================================================================

pub mod telemetry;

pub use error::{AnnotationError, CollaboratorError, GenerateError, Result, SchemaError};
