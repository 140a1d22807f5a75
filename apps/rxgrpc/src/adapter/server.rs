//! Server-side adapter: stream-returning service implementations bridged
//! onto the transport's unary and streaming call contracts.
//!
//! A [`ServiceAdapter`] is built once per service: each user method takes
//! the decoded request plus call metadata and returns a stream of
//! responses. The adapter wraps every method into the transport handler
//! shape and records it in an explicit [`MethodTable`], so dispatch is a
//! name lookup on fixed state.
//!
//! Failure containment: a panic inside a user method, a decode failure,
//! and a stream error are all converted into the transport's native error
//! delivery for that one call. Nothing escapes into transport state.
//!
//! Streaming error policy: after signaling the error channel the call is
//! always ended. Transports that treat error-then-end differently from
//! error-without-end observe one consistent sequence from this adapter.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use tonic::Status;
use tonic::metadata::MetadataMap;

use crate::adapter::transport::{
    BoxStream, MethodDef, MethodHandler, MethodTable, ServerCallWriter, ServiceDef,
    TransportServer, UnaryCallback,
};

/// Response stream produced by a user method.
pub type ResponseStream<Res> = BoxStream<Result<Res, Status>>;

/// One service implementation, wrapped for transport registration.
pub struct ServiceAdapter {
    name: String,
    methods: Vec<MethodDef>,
    table: MethodTable,
}

impl ServiceAdapter {
    /// Start an adapter for the named service.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
            table: MethodTable::new(),
        }
    }

    /// Register a unary method.
    ///
    /// The first emission of the returned stream becomes the response;
    /// anything after it is not solicited.
    #[must_use]
    pub fn unary<Req, Res, F>(mut self, method: &str, f: F) -> Self
    where
        Req: prost::Message + Default + 'static,
        Res: prost::Message + 'static,
        F: Fn(Req, MetadataMap) -> ResponseStream<Res> + Send + Sync + 'static,
    {
        self.methods.push(MethodDef {
            name: method.to_string(),
            server_streaming: false,
        });
        let f = Arc::new(f);
        self.table.insert(
            method,
            MethodHandler::Unary(Box::new(move |request, metadata, callback| {
                let f = Arc::clone(&f);
                Box::pin(serve_unary(f, request, metadata, callback))
            })),
        );
        self
    }

    /// Register a server-streaming method.
    #[must_use]
    pub fn server_streaming<Req, Res, F>(mut self, method: &str, f: F) -> Self
    where
        Req: prost::Message + Default + 'static,
        Res: prost::Message + 'static,
        F: Fn(Req, MetadataMap) -> ResponseStream<Res> + Send + Sync + 'static,
    {
        self.methods.push(MethodDef {
            name: method.to_string(),
            server_streaming: true,
        });
        let f = Arc::new(f);
        self.table.insert(
            method,
            MethodHandler::ServerStreaming(Box::new(move |request, metadata, writer| {
                let f = Arc::clone(&f);
                Box::pin(serve_streaming(f, request, metadata, writer))
            })),
        );
        self
    }

    /// Split into the transport-level definition and handler table.
    #[must_use]
    pub fn into_parts(self) -> (ServiceDef, MethodTable) {
        (
            ServiceDef {
                name: self.name,
                methods: self.methods,
            },
            self.table,
        )
    }
}

/// Invoke the user method and call back exactly once with the stream's
/// first emission, its error, or an internal error if it completed empty.
async fn serve_unary<Req, Res, F>(
    f: Arc<F>,
    request: Bytes,
    metadata: MetadataMap,
    callback: UnaryCallback,
) where
    Req: prost::Message + Default,
    Res: prost::Message,
    F: Fn(Req, MetadataMap) -> ResponseStream<Res>,
{
    let message = match Req::decode(request) {
        Ok(message) => message,
        Err(err) => {
            callback(Err(Status::invalid_argument(err.to_string())));
            return;
        }
    };
    let Some(mut stream) = invoke_contained(&*f, message, metadata) else {
        callback(Err(Status::internal("service implementation panicked")));
        return;
    };
    match stream.next().await {
        Some(Ok(response)) => callback(Ok(Bytes::from(response.encode_to_vec()))),
        Some(Err(status)) => callback(Err(status)),
        None => callback(Err(Status::internal(
            "service implementation produced no response",
        ))),
    }
}

/// Invoke the user method and forward each emission as one transport
/// write, awaiting the write before soliciting the next emission. On
/// stream error, signal the error channel and end the call.
async fn serve_streaming<Req, Res, F>(
    f: Arc<F>,
    request: Bytes,
    metadata: MetadataMap,
    mut writer: Box<dyn ServerCallWriter>,
) where
    Req: prost::Message + Default,
    Res: prost::Message,
    F: Fn(Req, MetadataMap) -> ResponseStream<Res>,
{
    let message = match Req::decode(request) {
        Ok(message) => message,
        Err(err) => {
            writer.fail(Status::invalid_argument(err.to_string())).await;
            writer.end().await;
            return;
        }
    };
    let Some(mut stream) = invoke_contained(&*f, message, metadata) else {
        writer
            .fail(Status::internal("service implementation panicked"))
            .await;
        writer.end().await;
        return;
    };
    while let Some(item) = stream.next().await {
        match item {
            Ok(response) => {
                if let Err(status) = writer.write(Bytes::from(response.encode_to_vec())).await {
                    tracing::warn!(%status, "transport rejected streaming write");
                    writer.fail(status).await;
                    writer.end().await;
                    return;
                }
            }
            Err(status) => {
                writer.fail(status).await;
                writer.end().await;
                return;
            }
        }
    }
    writer.end().await;
}

/// Run the user method, containing any panic it raises.
fn invoke_contained<Req, Res, F>(
    f: &F,
    message: Req,
    metadata: MetadataMap,
) -> Option<ResponseStream<Res>>
where
    F: Fn(Req, MetadataMap) -> ResponseStream<Res>,
{
    std::panic::catch_unwind(AssertUnwindSafe(|| f(message, metadata))).ok()
}

/// Registers wrapped services on a transport server and drives its
/// lifecycle.
pub struct RxServerBuilder<T> {
    server: T,
}

impl<T: TransportServer> RxServerBuilder<T> {
    /// Wrap a transport server.
    #[must_use]
    pub fn new(server: T) -> Self {
        Self { server }
    }

    /// Register one wrapped service.
    #[must_use]
    pub fn add_service(mut self, adapter: ServiceAdapter) -> Self {
        let (service, methods) = adapter.into_parts();
        tracing::info!(service = %service.name, methods = methods.len(), "registering service");
        self.server.register(service, methods);
        self
    }

    /// Bind and start the underlying server.
    pub async fn start(&mut self) -> Result<(), Status> {
        self.server.start().await
    }

    /// Stop the underlying server.
    pub async fn shutdown(&mut self) -> Result<(), Status> {
        self.server.shutdown().await
    }
}
