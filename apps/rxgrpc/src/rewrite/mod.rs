//! Structural rewrite of the generated intermediate module.
//!
//! The intermediate module is JavaScript emitted by the schema compiler in
//! static-module form: constructor functions annotated with JSDoc blocks,
//! prototype member assignments, and namespace container variables. The
//! annotation dialect this pipeline consumes:
//!
//! - Message constructors carry `@exports pkg.IMessage`, `@interface`, one
//!   `@property` tag per field, and `@constructor`.
//! - Service constructors carry `@exports pkg.Service` and declare more
//!   than one parameter; message constructors declare exactly one.
//! - Prototype members carry `@memberof` naming their owner and `@type`
//!   naming their type.
//! - Namespace containers are `var` declarations carrying `@namespace`
//!   and `@exports`.
//!
//! Five passes transform the module, each producing a new module from the
//! previous one:
//!
//! 1. [`enums`]: re-types enum-valued fields from `number` to their enum
//!    reference, using the schema descriptor as ground truth.
//! 2. [`interfaces`]: converts message and service constructors into
//!    interface declarations and drops the `I` naming prefix.
//! 3. [`signatures`]: rewrites RPC method signatures from callback and
//!    promise shapes to `Observable` returns with optional call metadata.
//! 4. [`members`]: prunes message prototype members, keeping oneof group
//!    accessors.
//! 5. [`synthesis`]: inserts `ClientFactory` and `ServerBuilder`
//!    interfaces into each namespace.
//!
//! Passes never mutate their input; [`apply`] threads the module through
//! all five in order.

use crate::descriptor::DescriptorTree;
use crate::error::GenerateError;

pub mod enums;
pub mod interfaces;
pub mod members;
pub mod signatures;
pub mod source;
pub mod synthesis;

pub use source::Module;

/// Run all five rewrite passes over `module`, in order.
pub fn apply(module: &Module, tree: &DescriptorTree) -> Result<Module, GenerateError> {
    let module = enums::run(module, tree)?;
    tracing::debug!("re-typed enum fields");
    let module = interfaces::run(&module);
    tracing::debug!("converted constructors to interfaces");
    let module = signatures::run(&module);
    tracing::debug!("rewrote method signatures");
    let module = members::run(&module, tree);
    tracing::debug!("pruned prototype members");
    synthesis::run(&module)
}
