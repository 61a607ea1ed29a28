//! Upstream bus abstraction
//!
//! The driver never talks to hardware directly; it submits
//! [`TransferRequest`]s to a [`Bus`] and hands it the lifecycle events
//! it does not consume itself. The `hostbus` crate implements this over
//! rusb; tests use the scripted bus in [`crate::testing`].

use crate::device::LifecycleEvent;
use protocol::{BusError, Completion, TransferKind};

/// Completion continuation for one transfer.
///
/// Consumed exactly once, by whichever path (success or failure)
/// completes the transfer. Completions may run on the bus's completion
/// context, possibly a different thread at elevated priority, and must
/// not block.
pub type CompletionHandler = Box<dyn FnOnce(Completion) + Send + 'static>;

/// One logical request to move bytes across the bus.
///
/// Owns its payload and its completion continuation; submitting it
/// transfers ownership to the bus, which consumes the request by
/// delivering exactly one [`Completion`].
pub struct TransferRequest {
    kind: TransferKind,
    complete: CompletionHandler,
}

impl TransferRequest {
    /// Build a request around `kind`, to be finished by `complete`.
    pub fn new(kind: TransferKind, complete: impl FnOnce(Completion) + Send + 'static) -> Self {
        Self {
            kind,
            complete: Box::new(complete),
        }
    }

    /// The transfer this request describes.
    pub fn kind(&self) -> &TransferKind {
        &self.kind
    }

    /// Take the payload out of the request, leaving the continuation.
    ///
    /// Bus implementations use this to move the buffer into their
    /// transfer machinery before completing.
    pub fn into_parts(self) -> (TransferKind, CompletionHandler) {
        (self.kind, self.complete)
    }

    /// Consume the request by delivering its completion.
    pub fn complete(self, completion: Completion) {
        (self.complete)(completion)
    }
}

/// The upstream bus endpoint the device sits on.
///
/// Implementations carry transfers to the USB stack and accept the
/// lifecycle events the driver forwards downstream.
pub trait Bus: Send + Sync {
    /// Submit one transfer. All outcomes, including submission
    /// failures, are delivered through the request's completion;
    /// exactly one completion fires per submitted request.
    fn submit(&self, request: TransferRequest);

    /// Forward a lifecycle event to the upstream stack. For the start
    /// event the driver requires this to succeed before it begins its
    /// own start handling.
    fn forward_event(&self, event: &LifecycleEvent) -> Result<(), BusError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_request_completes_exactly_once() {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_in_callback = Arc::clone(&fired);
        let request = TransferRequest::new(
            TransferKind::Bulk {
                endpoint: 0x02,
                data: vec![1, 2, 3],
            },
            move |completion| {
                assert!(completion.is_success());
                fired_in_callback.fetch_add(1, Ordering::SeqCst);
            },
        );
        assert_eq!(request.kind().len(), 3);
        request.complete(Completion::sent(3));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
