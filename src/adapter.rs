//! Transport seam between the guest client and a host.
//!
//! A [`HostAdapter`] is the guest-facing half of whatever carries messages
//! to the host: a webview channel, a socket, or the in-process
//! [`LocalAdapter`] defined here. Lookups and writes are synchronous; calls
//! are posted and answered later through the adapter's own notification path.

use crate::error::{BridgeError, Result};
use crate::guest::GuestClient;
use crate::host::SharedHost;
use crate::message::{CallMessage, ResultMessage};
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Guest-facing side of a bridge transport
pub trait HostAdapter {
    /// Synchronous constant lookup, as JSON text
    fn get_constant(&self, name: &str) -> String;

    /// Synchronous variable lookup, as JSON text
    fn get_variable(&self, name: &str) -> String;

    /// Fire-and-forget variable write. `raw` should be JSON text.
    fn set_variable(&self, name: &str, raw: &str);

    /// Hand a Call to the transport. Fails only if the transport is gone.
    fn post_call(&self, call: CallMessage) -> Result<()>;
}

/// In-process adapter driving a [`SharedHost`] directly.
///
/// Calls run on the host as they are posted; their Results are queued on a
/// channel and only reach the guest when the paired [`ResultStream`] is
/// drained.
#[derive(Clone)]
pub struct LocalAdapter {
    host: SharedHost,
    results: mpsc::UnboundedSender<ResultMessage>,
}

impl LocalAdapter {
    /// Connect to a host, returning the adapter and its result stream
    pub fn connect(host: SharedHost) -> (Self, ResultStream) {
        let (results, receiver) = mpsc::unbounded_channel();
        (Self { host, results }, ResultStream { receiver })
    }

    /// The host behind this adapter
    pub fn host(&self) -> &SharedHost {
        &self.host
    }
}

impl HostAdapter for LocalAdapter {
    fn get_constant(&self, name: &str) -> String {
        self.host.lock().lookup_constant(name)
    }

    fn get_variable(&self, name: &str) -> String {
        self.host.lock().lookup_variable(name)
    }

    fn set_variable(&self, name: &str, raw: &str) {
        self.host.lock().write_variable(name, raw);
    }

    fn post_call(&self, call: CallMessage) -> Result<()> {
        if self.results.is_closed() {
            return Err(BridgeError::Transport("result stream closed".to_string()));
        }

        let result = self.host.lock().handle_call(call);
        self.results
            .send(result)
            .map_err(|_| BridgeError::Transport("result stream closed".to_string()))
    }
}

impl std::fmt::Debug for LocalAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalAdapter")
            .field("closed", &self.results.is_closed())
            .finish_non_exhaustive()
    }
}

/// Results produced by a host, waiting to be delivered to the guest
#[derive(Debug)]
pub struct ResultStream {
    receiver: mpsc::UnboundedReceiver<ResultMessage>,
}

impl ResultStream {
    /// Take the next queued Result without waiting
    pub fn try_next(&mut self) -> Option<ResultMessage> {
        self.receiver.try_recv().ok()
    }

    /// Wait for the next Result. `None` once every adapter is dropped.
    pub async fn next(&mut self) -> Option<ResultMessage> {
        self.receiver.recv().await
    }

    /// Take everything queued so far
    pub fn drain(&mut self) -> Vec<ResultMessage> {
        let mut results = Vec::new();
        while let Ok(result) = self.receiver.try_recv() {
            results.push(result);
        }
        results
    }

    /// Deliver everything queued so far to `client`.
    ///
    /// Returns the number of calls settled.
    pub fn deliver_queued<A: HostAdapter>(&mut self, client: &GuestClient<A>) -> usize {
        let settled = self
            .drain()
            .into_iter()
            .map(|result| client.deliver(result))
            .filter(|settled| *settled)
            .count();
        trace!(settled, "Delivered queued results");
        settled
    }

    /// Deliver Results to `client` as they arrive until nothing is pending.
    ///
    /// Returns the number of calls settled, stopping early if every adapter
    /// is dropped.
    pub async fn deliver_until_idle<A: HostAdapter>(&mut self, client: &GuestClient<A>) -> usize {
        let mut settled = 0;
        while client.pending_count() > 0 {
            match self.receiver.recv().await {
                Some(result) => {
                    if client.deliver(result) {
                        settled += 1;
                    }
                }
                None => {
                    debug!("Result stream closed");
                    break;
                }
            }
        }
        settled
    }
}
