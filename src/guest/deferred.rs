//! Deferred call results.

use crate::error::CallError;
use crate::message::CorrelationId;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot::{self, error::TryRecvError};

/// What a deferred settles with: the payload or the structured error
pub type CallOutcome = Result<Value, CallError>;

/// A not-yet-available call result, settled exactly once.
///
/// Await it, or poll it without blocking through [`Deferred::try_take`].
#[derive(Debug)]
pub struct Deferred {
    correlation_id: CorrelationId,
    // None once the outcome has been handed out
    receiver: Option<oneshot::Receiver<CallOutcome>>,
}

impl Deferred {
    pub(crate) fn new(correlation_id: CorrelationId, receiver: oneshot::Receiver<CallOutcome>) -> Self {
        Self {
            correlation_id,
            receiver: Some(receiver),
        }
    }

    /// A deferred that is already rejected
    pub fn rejected(correlation_id: CorrelationId, error: CallError) -> Self {
        let (sender, receiver) = oneshot::channel();
        let _ = sender.send(Err(error));
        Self::new(correlation_id, receiver)
    }

    /// Correlation ID of the call this deferred belongs to
    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    /// Take the outcome if the call has settled.
    ///
    /// Returns `None` while the call is outstanding. The outcome is handed
    /// out once; later calls, and awaiting afterwards, report `Disconnected`.
    pub fn try_take(&mut self) -> Option<CallOutcome> {
        let Some(receiver) = self.receiver.as_mut() else {
            return Some(Err(self.consumed()));
        };
        match receiver.try_recv() {
            Ok(outcome) => {
                self.receiver = None;
                Some(outcome)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => {
                self.receiver = None;
                Some(Err(self.dropped()))
            }
        }
    }

    fn dropped(&self) -> CallError {
        CallError::disconnected(format!(
            "Call '{}' was dropped before it settled",
            self.correlation_id
        ))
    }

    fn consumed(&self) -> CallError {
        CallError::disconnected(format!(
            "Outcome of call '{}' was already taken",
            self.correlation_id
        ))
    }
}

impl Future for Deferred {
    type Output = CallOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let Some(receiver) = self.receiver.as_mut() else {
            return Poll::Ready(Err(self.consumed()));
        };
        let polled = Pin::new(receiver).poll(cx);
        match polled {
            Poll::Ready(Ok(outcome)) => {
                self.receiver = None;
                Poll::Ready(outcome)
            }
            Poll::Ready(Err(_)) => {
                self.receiver = None;
                Poll::Ready(Err(self.dropped()))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_await_resolved() {
        let (sender, receiver) = oneshot::channel();
        let deferred = Deferred::new("req_1".into(), receiver);
        sender.send(Ok(json!(42))).unwrap();

        assert_eq!(deferred.await.unwrap(), json!(42));
    }

    #[tokio::test]
    async fn test_await_dropped_sender() {
        let (sender, receiver) = oneshot::channel::<CallOutcome>();
        let deferred = Deferred::new("req_1".into(), receiver);
        drop(sender);

        let err = deferred.await.unwrap_err();
        assert!(err.is(ErrorCode::Disconnected));
        assert!(err.message.contains("req_1"));
    }

    #[test]
    fn test_try_take_pending_then_settled() {
        let (sender, receiver) = oneshot::channel();
        let mut deferred = Deferred::new("req_2".into(), receiver);

        assert!(deferred.try_take().is_none());
        sender.send(Err(CallError::no_such_method("x"))).unwrap();

        let err = deferred.try_take().unwrap().unwrap_err();
        assert!(err.is(ErrorCode::NoSuchMethod));
    }

    #[tokio::test]
    async fn test_rejected() {
        let deferred = Deferred::rejected("req_3".into(), CallError::expired("req_3"));
        assert_eq!(deferred.correlation_id().as_str(), "req_3");
        assert!(deferred.await.unwrap_err().is(ErrorCode::Expired));
    }

    #[tokio::test]
    async fn test_await_after_try_take() {
        let (sender, receiver) = oneshot::channel();
        let mut deferred = Deferred::new("req_4".into(), receiver);
        sender.send(Ok(json!("done"))).unwrap();

        assert_eq!(deferred.try_take().unwrap().unwrap(), json!("done"));

        let again = deferred.try_take().unwrap().unwrap_err();
        assert!(again.is(ErrorCode::Disconnected));

        let err = (&mut deferred).await.unwrap_err();
        assert!(err.is(ErrorCode::Disconnected));
        assert!(err.message.contains("req_4"));
    }

    #[tokio::test]
    async fn test_try_take_after_await() {
        let (sender, receiver) = oneshot::channel();
        let mut deferred = Deferred::new("req_5".into(), receiver);
        sender.send(Ok(json!(1))).unwrap();

        assert_eq!((&mut deferred).await.unwrap(), json!(1));
        assert!(deferred.try_take().unwrap().unwrap_err().is(ErrorCode::Disconnected));
    }
}
