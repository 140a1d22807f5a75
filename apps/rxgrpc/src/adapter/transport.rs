//! Transport contract for the runtime adapter.
//!
//! The adapter does not talk to a concrete RPC runtime. It is written
//! against the small surface defined here: a server that accepts service
//! registrations keyed by a [`ServiceDef`] plus a [`MethodTable`] of
//! wrapped handlers, and a client stub exposing one callback-style unary
//! entry point and one event-style streaming entry point. Messages cross
//! this boundary encoded as [`Bytes`]; failures cross it as
//! [`tonic::Status`].
//!
//! Tests install in-memory implementations of these traits; a production
//! binding maps them onto its native call objects.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use tonic::Status;
use tonic::metadata::MetadataMap;

/// Boxed message stream used on both sides of the adapter.
pub type BoxStream<T> = Pin<Box<dyn Stream<Item = T> + Send>>;

/// Boxed future returned by wrapped method handlers.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Completion callback for a unary call. Invoked exactly once.
pub type UnaryCallback = Box<dyn FnOnce(Result<Bytes, Status>) + Send>;

/// Handler for a unary method: request bytes, call metadata, and the
/// transport's completion callback.
pub type UnaryHandler =
    Box<dyn Fn(Bytes, MetadataMap, UnaryCallback) -> BoxFuture<()> + Send + Sync>;

/// Handler for a server-streaming method: request bytes, call metadata,
/// and the transport's response writer.
pub type StreamingHandler =
    Box<dyn Fn(Bytes, MetadataMap, Box<dyn ServerCallWriter>) -> BoxFuture<()> + Send + Sync>;

/// One RPC method as the transport sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDef {
    /// Method name within its service.
    pub name: String,
    /// Whether the method streams responses.
    pub server_streaming: bool,
}

/// One service as the transport sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDef {
    /// Fully qualified service name.
    pub name: String,
    /// Declared methods, in schema order.
    pub methods: Vec<MethodDef>,
}

/// A wrapped method implementation, ready for transport dispatch.
pub enum MethodHandler {
    /// Single response via completion callback.
    Unary(UnaryHandler),
    /// Response sequence via a [`ServerCallWriter`].
    ServerStreaming(StreamingHandler),
}

impl std::fmt::Debug for MethodHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unary(_) => f.write_str("MethodHandler::Unary"),
            Self::ServerStreaming(_) => f.write_str("MethodHandler::ServerStreaming"),
        }
    }
}

/// Explicit method-name-to-handler table built once at adapter
/// construction.
#[derive(Debug, Default)]
pub struct MethodTable {
    handlers: HashMap<String, MethodHandler>,
}

impl MethodTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a handler under its method name.
    pub fn insert(&mut self, name: impl Into<String>, handler: MethodHandler) {
        self.handlers.insert(name.into(), handler);
    }

    /// Look up the handler for a method name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&MethodHandler> {
        self.handlers.get(name)
    }

    /// Number of registered methods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether the table has no methods.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Server-side writer for one streaming call.
///
/// `write` is awaited before the next response is solicited, so the user
/// stream is consumed no faster than the transport accepts writes.
#[async_trait]
pub trait ServerCallWriter: Send {
    /// Write one response message.
    async fn write(&mut self, message: Bytes) -> Result<(), Status>;

    /// End the call normally.
    async fn end(&mut self);

    /// Signal the call's error channel.
    async fn fail(&mut self, status: Status);
}

/// Server construct the adapter registers services on.
#[async_trait]
pub trait TransportServer: Send {
    /// Register one service with its wrapped method handlers.
    fn register(&mut self, service: ServiceDef, methods: MethodTable);

    /// Bind and start serving.
    async fn start(&mut self) -> Result<(), Status>;

    /// Stop serving and release the binding.
    async fn shutdown(&mut self) -> Result<(), Status>;
}

/// Event emitted by a client-side streaming call.
#[derive(Debug, Clone)]
pub enum CallEvent {
    /// One response message.
    Data(Bytes),
    /// The call failed; no further events follow.
    Error(Status),
    /// The call ended normally; no further events follow.
    End,
}

/// Handle to one in-flight client streaming call.
pub struct StreamingCall {
    /// Data, error, and end events in arrival order.
    pub events: BoxStream<CallEvent>,
    /// Cancel the underlying call. Idempotent.
    pub cancel: Box<dyn FnOnce() + Send>,
}

/// Client stub surface the adapter wraps, one method per RPC.
pub trait ClientStub: Send + Sync {
    /// Invoke a unary method; the callback is invoked exactly once.
    fn unary(&self, method: &str, request: Bytes, metadata: MetadataMap, callback: UnaryCallback);

    /// Invoke a server-streaming method, returning the call handle.
    fn server_streaming(
        &self,
        method: &str,
        request: Bytes,
        metadata: MetadataMap,
    ) -> StreamingCall;
}
