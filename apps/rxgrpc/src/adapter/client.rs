//! Client-side adapter: transport stub calls exposed as streams.
//!
//! Unary calls become single-item streams carrying either the decoded
//! response or the call's status; exactly one terminal item is ever
//! produced. Streaming calls are shared: all subscriptions to one
//! [`SharedStreamingCall`] observe the same underlying transport call, and
//! the call is cancelled when the last subscription is dropped before the
//! call finished. Whether a late subscriber sees already-delivered
//! responses is controlled by [`ReplayPolicy`].

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tonic::Status;
use tonic::metadata::MetadataMap;

use crate::adapter::transport::{BoxStream, CallEvent, ClientStub};

/// What a subscriber that joins mid-call observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplayPolicy {
    /// Only responses delivered after subscribing.
    #[default]
    None,
    /// Every response the call has delivered so far, then live responses.
    All,
}

/// Stream-returning client for one service.
pub struct ServiceClient<S> {
    stub: Arc<S>,
    replay: ReplayPolicy,
}

impl<S: ClientStub + 'static> ServiceClient<S> {
    /// Wrap a transport stub with the default replay policy.
    pub fn new(stub: S) -> Self {
        Self::with_replay(stub, ReplayPolicy::default())
    }

    /// Wrap a transport stub with an explicit replay policy for streaming
    /// calls.
    pub fn with_replay(stub: S, replay: ReplayPolicy) -> Self {
        Self {
            stub: Arc::new(stub),
            replay,
        }
    }

    /// Invoke a unary method.
    ///
    /// The stream is cold: the transport call is issued when it is first
    /// polled, not when it is created. It yields exactly one item and then
    /// completes.
    pub fn unary<Req, Res>(
        &self,
        method: &str,
        request: Req,
        metadata: MetadataMap,
    ) -> BoxStream<Result<Res, Status>>
    where
        Req: prost::Message,
        Res: prost::Message + Default + 'static,
    {
        let stub = Arc::clone(&self.stub);
        let method = method.to_string();
        let request = Bytes::from(request.encode_to_vec());
        Box::pin(futures::stream::once(async move {
            let (tx, rx) = tokio::sync::oneshot::channel();
            stub.unary(
                &method,
                request,
                metadata,
                Box::new(move |result| {
                    let _ = tx.send(result);
                }),
            );
            match rx.await {
                Ok(Ok(bytes)) => {
                    Res::decode(bytes).map_err(|err| Status::internal(err.to_string()))
                }
                Ok(Err(status)) => Err(status),
                Err(_) => Err(Status::cancelled("call completed without a response")),
            }
        }))
    }

    /// Invoke a server-streaming method, returning the shared call handle.
    pub fn server_streaming<Req, Res>(
        &self,
        method: &str,
        request: Req,
        metadata: MetadataMap,
    ) -> SharedStreamingCall<Res>
    where
        Req: prost::Message,
        Res: prost::Message + Default + Clone + Send + 'static,
    {
        let call =
            self.stub
                .server_streaming(method, Bytes::from(request.encode_to_vec()), metadata);
        SharedStreamingCall::spawn(call.events, call.cancel, self.replay)
    }
}

/// Terminal outcome of a streaming call.
#[derive(Debug, Clone)]
enum Terminal {
    Ended,
    Failed(Status),
}

struct SharedState<Res> {
    subscribers: Vec<mpsc::UnboundedSender<Result<Res, Status>>>,
    // Successfully delivered responses only; a failure is recorded in
    // `terminal` so every subscriber observes at most one error.
    delivered: Vec<Res>,
    terminal: Option<Terminal>,
    active: usize,
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

/// One in-flight streaming call shared across subscribers.
///
/// A pump task owns the transport call's event stream and fans decoded
/// responses out to every live subscription. Dropping the last
/// subscription before the call finished cancels the transport call.
pub struct SharedStreamingCall<Res> {
    state: Arc<Mutex<SharedState<Res>>>,
    replay: ReplayPolicy,
}

impl<Res> SharedStreamingCall<Res>
where
    Res: prost::Message + Default + Clone + Send + 'static,
{
    fn spawn(
        events: BoxStream<CallEvent>,
        cancel: Box<dyn FnOnce() + Send>,
        replay: ReplayPolicy,
    ) -> Self {
        let state = Arc::new(Mutex::new(SharedState {
            subscribers: Vec::new(),
            delivered: Vec::new(),
            terminal: None,
            active: 0,
            cancel: Some(cancel),
        }));
        tokio::spawn(pump(events, Arc::clone(&state), replay));
        Self { state, replay }
    }

    /// Subscribe to the call's responses.
    ///
    /// With [`ReplayPolicy::All`], responses delivered before subscribing
    /// are replayed first; with [`ReplayPolicy::None`], only future
    /// responses are observed. A subscription to a finished call observes
    /// the recorded outcome immediately.
    pub fn subscribe(&self) -> Subscription<Res> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock();
        if self.replay == ReplayPolicy::All {
            for item in &state.delivered {
                let _ = tx.send(Ok(item.clone()));
            }
        }
        match &state.terminal {
            Some(Terminal::Failed(status)) => {
                let _ = tx.send(Err(status.clone()));
            }
            Some(Terminal::Ended) => {}
            None => state.subscribers.push(tx),
        }
        state.active += 1;
        Subscription {
            receiver: rx,
            state: Arc::clone(&self.state),
        }
    }
}

/// Consume transport events, decode, and fan out to subscribers.
async fn pump<Res>(
    mut events: BoxStream<CallEvent>,
    state: Arc<Mutex<SharedState<Res>>>,
    replay: ReplayPolicy,
) where
    Res: prost::Message + Default + Clone,
{
    while let Some(event) = events.next().await {
        match event {
            CallEvent::Data(bytes) => match Res::decode(bytes) {
                Ok(response) => {
                    let mut state = state.lock();
                    if replay == ReplayPolicy::All {
                        state.delivered.push(response.clone());
                    }
                    state
                        .subscribers
                        .retain(|subscriber| subscriber.send(Ok(response.clone())).is_ok());
                }
                // An undecodable response terminates the call like a
                // transport error; it never enters the replay buffer.
                Err(err) => {
                    let status = Status::internal(err.to_string());
                    let mut state = state.lock();
                    for subscriber in &state.subscribers {
                        let _ = subscriber.send(Err(status.clone()));
                    }
                    finish(&mut state, Terminal::Failed(status));
                    return;
                }
            },
            CallEvent::Error(status) => {
                let mut state = state.lock();
                for subscriber in &state.subscribers {
                    let _ = subscriber.send(Err(status.clone()));
                }
                finish(&mut state, Terminal::Failed(status));
                return;
            }
            CallEvent::End => {
                let mut state = state.lock();
                finish(&mut state, Terminal::Ended);
                return;
            }
        }
    }
    // Event stream ended without an explicit end event; treat as ended.
    finish(&mut state.lock(), Terminal::Ended);
}

fn finish<Res>(state: &mut SharedState<Res>, terminal: Terminal) {
    state.terminal = Some(terminal);
    state.subscribers.clear();
    // The call is over; there is nothing left to cancel.
    state.cancel = None;
}

/// One subscriber's view of a shared streaming call.
pub struct Subscription<Res> {
    receiver: mpsc::UnboundedReceiver<Result<Res, Status>>,
    state: Arc<Mutex<SharedState<Res>>>,
}

impl<Res> Stream for Subscription<Res> {
    type Item = Result<Res, Status>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

impl<Res> Drop for Subscription<Res> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        state.active -= 1;
        if state.active == 0
            && state.terminal.is_none()
            && let Some(cancel) = state.cancel.take()
        {
            tracing::debug!("last subscriber dropped, cancelling call");
            cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_replay_policy_is_none() {
        assert_eq!(ReplayPolicy::default(), ReplayPolicy::None);
    }
}
