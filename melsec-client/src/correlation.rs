//! Request/response correlation
//!
//! The MELSEC protocol carries no request identifier: the device answers
//! requests strictly in the order it received them. Correlation is therefore
//! a FIFO queue of pending requests, and every inbound response resolves the
//! queue head. Each pending request is resolved exactly once, by whichever of
//! {response, timeout, write failure, connection fault} reaches the queue
//! first; the losers find the entry gone and become no-ops.

use melsec_core::{MelsecError, MelsecResult, ResponseFrame};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task::AbortHandle;

/// Completion handle returned to the caller of a send; resolves exactly once
pub(crate) type Completion = oneshot::Receiver<MelsecResult<ResponseFrame>>;

/// A sent request awaiting its correlated response or a failure
struct PendingRequest {
    seq: u64,
    completion: oneshot::Sender<MelsecResult<ResponseFrame>>,
    timer: AbortHandle,
    created_at: Instant,
}

impl PendingRequest {
    /// Resolve the request, cancelling its timer. Consumes the entry, so a
    /// request can never be resolved twice.
    fn resolve(self, result: MelsecResult<ResponseFrame>) {
        self.timer.abort();
        // The caller may have gone away; an undeliverable result is fine.
        let _ = self.completion.send(result);
    }
}

/// FIFO correlator for in-flight requests
pub(crate) struct Correlator {
    request_timeout: Duration,
    queue: Mutex<VecDeque<PendingRequest>>,
    next_seq: AtomicU64,
}

impl Correlator {
    pub(crate) fn new(request_timeout: Duration) -> Self {
        Self {
            request_timeout,
            queue: Mutex::new(VecDeque::new()),
            next_seq: AtomicU64::new(1),
        }
    }

    /// Accept a request for sending: allocate its slot at the queue tail and
    /// arm its timeout.
    ///
    /// Must be called while holding the connection's write lock, immediately
    /// before the write, so that queue order equals wire order.
    pub(crate) fn register(self: &Arc<Self>) -> (u64, Completion) {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();

        // The timer is armed under the queue lock: a fire cannot reach the
        // queue before its own entry does.
        let mut queue = self.queue.lock().unwrap();
        let this = Arc::clone(self);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(this.request_timeout).await;
            this.expire(seq);
        })
        .abort_handle();
        queue.push_back(PendingRequest {
            seq,
            completion: tx,
            timer,
            created_at: Instant::now(),
        });
        drop(queue);
        (seq, rx)
    }

    /// Deliver an inbound response to the oldest pending request
    ///
    /// An unmatched response is dropped, not escalated: a late timeout may
    /// already have resolved its slot. This relies on the transport delivering
    /// responses in order; out-of-order delivery would go undetected here.
    pub(crate) fn on_response(&self, response: ResponseFrame) {
        let head = self.queue.lock().unwrap().pop_front();
        match head {
            Some(pending) => pending.resolve(Ok(response)),
            None => {
                log::debug!(
                    "Received response with no pending request ({} bytes), dropping",
                    response.payload().len()
                );
            }
        }
    }

    /// Timer callback for the request with sequence number `seq`
    ///
    /// The seq lookup is the cancelled-timer test: if a response won the
    /// race, the entry is gone and the fire is a no-op. The entry is removed
    /// wherever it sits, not only at the head: timers armed at the same
    /// deadline can reach the queue in either order, and a fire that only
    /// popped the head would strand the younger request with its one timer
    /// fire already spent.
    pub(crate) fn expire(&self, seq: u64) {
        let expired = {
            let mut queue = self.queue.lock().unwrap();
            let pos = queue.iter().position(|pending| pending.seq == seq);
            pos.and_then(|pos| queue.remove(pos))
        };
        if let Some(pending) = expired {
            log::warn!(
                "Request timed out after {:?} (configured {:?})",
                pending.created_at.elapsed(),
                self.request_timeout
            );
            pending.resolve(Err(MelsecError::RequestTimeout(self.request_timeout)));
        }
    }

    /// Remove the request with sequence number `seq` if it is still queued
    ///
    /// Used on a synchronous write failure. Returns `false` when the entry
    /// was already resolved by a concurrent fault, in which case the caller
    /// must await its completion for the definitive cause instead.
    pub(crate) fn abandon(&self, seq: u64) -> bool {
        let removed = {
            let mut queue = self.queue.lock().unwrap();
            let pos = queue.iter().position(|pending| pending.seq == seq);
            pos.and_then(|pos| queue.remove(pos))
        };
        match removed {
            Some(pending) => {
                pending.timer.abort();
                true
            }
            None => false,
        }
    }

    /// Resolve every pending request with a connection fault
    pub(crate) fn fail_all(&self, cause: &str) {
        let drained: Vec<PendingRequest> = {
            let mut queue = self.queue.lock().unwrap();
            queue.drain(..).collect()
        };
        if !drained.is_empty() {
            log::warn!("Failing {} pending request(s): {}", drained.len(), cause);
        }
        for pending in drained {
            pending.resolve(Err(MelsecError::ConnectionFault(cause.to_string())));
        }
    }

    /// Number of requests currently awaiting resolution
    pub(crate) fn pending_count(&self) -> usize {
        self.queue.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn correlator(timeout: Duration) -> Arc<Correlator> {
        Arc::new(Correlator::new(timeout))
    }

    fn response(payload: &'static [u8]) -> ResponseFrame {
        ResponseFrame::new(Bytes::from_static(payload))
    }

    #[tokio::test]
    async fn test_responses_resolve_in_fifo_order() {
        let correlator = correlator(Duration::from_secs(10));
        let (_, rx_a) = correlator.register();
        let (_, rx_b) = correlator.register();

        correlator.on_response(response(b"ra"));
        correlator.on_response(response(b"rb"));

        assert_eq!(rx_a.await.unwrap().unwrap(), response(b"ra"));
        assert_eq!(rx_b.await.unwrap().unwrap(), response(b"rb"));
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_unmatched_response_is_dropped() {
        let correlator = correlator(Duration::from_secs(10));
        correlator.on_response(response(b"stray"));
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_resolves_head() {
        let correlator = correlator(Duration::from_millis(200));
        let (_, rx) = correlator.register();

        let start = tokio::time::Instant::now();
        let result = rx.await.unwrap();
        assert_eq!(
            result.unwrap_err(),
            MelsecError::RequestTimeout(Duration::from_millis(200))
        );
        assert_eq!(start.elapsed(), Duration::from_millis(200));
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_timer_does_not_pop_younger_request() {
        let correlator = correlator(Duration::from_millis(200));
        let (seq_a, rx_a) = correlator.register();
        correlator.on_response(response(b"ra"));
        assert_eq!(rx_a.await.unwrap().unwrap(), response(b"ra"));

        let (_, rx_b) = correlator.register();
        // A stale fire for the already-resolved request must be a no-op.
        correlator.expire(seq_a);
        assert_eq!(correlator.pending_count(), 1);

        correlator.on_response(response(b"rb"));
        assert_eq!(rx_b.await.unwrap().unwrap(), response(b"rb"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_order_timer_fires_resolve_their_own_requests() {
        let correlator = correlator(Duration::from_millis(200));
        let (seq_a, rx_a) = correlator.register();
        let (seq_b, rx_b) = correlator.register();

        // Two timers armed at the same deadline can reach the queue in
        // either order; each fire must resolve its own request.
        correlator.expire(seq_b);
        correlator.expire(seq_a);

        assert_eq!(
            rx_a.await.unwrap().unwrap_err(),
            MelsecError::RequestTimeout(Duration::from_millis(200))
        );
        assert_eq!(
            rx_b.await.unwrap().unwrap_err(),
            MelsecError::RequestTimeout(Duration::from_millis(200))
        );
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_expire_on_empty_queue_is_noop() {
        let correlator = correlator(Duration::from_millis(200));
        correlator.expire(42);
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_fail_all_drains_every_pending_request() {
        let correlator = correlator(Duration::from_secs(10));
        let (_, rx_a) = correlator.register();
        let (_, rx_b) = correlator.register();
        let (_, rx_c) = correlator.register();

        correlator.fail_all("peer reset");
        assert_eq!(correlator.pending_count(), 0);

        for rx in [rx_a, rx_b, rx_c] {
            assert_eq!(
                rx.await.unwrap().unwrap_err(),
                MelsecError::ConnectionFault("peer reset".to_string())
            );
        }

        // Later callbacks against the drained queue are no-ops.
        correlator.on_response(response(b"late"));
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_abandon_removes_queued_entry() {
        let correlator = correlator(Duration::from_secs(10));
        let (_, rx_a) = correlator.register();
        let (seq_b, _rx_b) = correlator.register();

        assert!(correlator.abandon(seq_b));
        assert_eq!(correlator.pending_count(), 1);

        // The surviving head still resolves normally.
        correlator.on_response(response(b"ra"));
        assert_eq!(rx_a.await.unwrap().unwrap(), response(b"ra"));
    }

    #[tokio::test]
    async fn test_abandon_after_fault_reports_absent() {
        let correlator = correlator(Duration::from_secs(10));
        let (seq, rx) = correlator.register();

        correlator.fail_all("peer reset");
        assert!(!correlator.abandon(seq));
        assert!(matches!(
            rx.await.unwrap().unwrap_err(),
            MelsecError::ConnectionFault(_)
        ));
    }
}
