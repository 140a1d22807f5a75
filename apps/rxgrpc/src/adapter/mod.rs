//! # Reactive RPC Adapter
//!
//! Runtime bridge between stream-shaped service code and a callback and
//! event shaped RPC transport. [`transport`] defines the contract the
//! adapter is written against, [`server`] wraps stream-returning service
//! implementations for transport dispatch, and [`client`] exposes
//! transport stub calls as streams.

pub mod client;
pub mod server;
pub mod transport;

pub use client::{ReplayPolicy, ServiceClient, SharedStreamingCall, Subscription};
pub use server::{ResponseStream, RxServerBuilder, ServiceAdapter};
pub use transport::{
    BoxStream, CallEvent, ClientStub, MethodDef, MethodHandler, MethodTable, ServerCallWriter,
    ServiceDef, StreamingCall, TransportServer, UnaryCallback,
};
