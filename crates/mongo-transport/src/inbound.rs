//! Inbound queue and the single pending read.
//!
//! This is the synchronous core of the transport. It owns the queued
//! inbound regions, at most one pending read request, and the terminal
//! state. It never invokes a completion itself: operations that finish a
//! read return a [`Ready`] which the caller runs after dropping the lock.

use std::collections::VecDeque;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::buffer::CompositeBuffer;
use crate::error::{Result, TransportError};

/// Callback form of a read completion.
pub(crate) type ReadCallback = Box<dyn FnOnce(Result<CompositeBuffer>) + Send + 'static>;

/// Where a finished read is delivered.
pub(crate) enum ReadCompletion {
    /// Resolves a [`ReadFuture`](crate::ReadFuture) or a blocking wait.
    Channel(oneshot::Sender<Result<CompositeBuffer>>),
    /// Invoked once with the result.
    Callback(ReadCallback),
}

impl ReadCompletion {
    pub(crate) fn complete(self, result: Result<CompositeBuffer>) {
        match self {
            Self::Channel(tx) => {
                // receiver gone: the caller stopped waiting
                let _ = tx.send(result);
            }
            Self::Callback(f) => f(result),
        }
    }
}

/// A finished read whose completion has not run yet.
#[must_use = "a ready completion must be run"]
pub(crate) struct Ready {
    completion: ReadCompletion,
    result: Result<CompositeBuffer>,
}

impl Ready {
    /// Deliver the result. Call with no lock held.
    pub(crate) fn run(self) {
        self.completion.complete(self.result);
    }
}

/// What [`Inbound::close`] hands back.
pub(crate) struct Closed {
    pub(crate) regions: Vec<Bytes>,
    pub(crate) abandoned: Option<ReadCompletion>,
}

struct PendingRead {
    len: usize,
    issued: Instant,
    completion: ReadCompletion,
}

/// Queued inbound bytes plus the pending read slot.
pub(crate) struct Inbound {
    regions: VecDeque<Bytes>,
    buffered: usize,
    pending: Option<PendingRead>,
    last_delivery: Instant,
    failure: Option<TransportError>,
    closed: bool,
}

impl Default for Inbound {
    fn default() -> Self {
        Self {
            regions: VecDeque::new(),
            buffered: 0,
            pending: None,
            last_delivery: Instant::now(),
            failure: None,
            closed: false,
        }
    }
}

impl Inbound {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Bytes queued and not yet handed to a read.
    pub(crate) fn buffered(&self) -> usize {
        self.buffered
    }

    pub(crate) fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Whether the reader should stop pulling from the socket: no read is
    /// waiting and at least `high_water` bytes are queued.
    pub(crate) fn is_saturated(&self, high_water: usize) -> bool {
        self.pending.is_none() && self.buffered >= high_water
    }

    pub(crate) fn failure(&self) -> Option<&TransportError> {
        self.failure.as_ref()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }

    /// Queue an inbound region and satisfy the pending read if it can be.
    ///
    /// Regions arriving after close or failure are returned in `Err` so the
    /// caller can recycle their storage.
    pub(crate) fn deliver(&mut self, region: Bytes) -> std::result::Result<Option<Ready>, Bytes> {
        if self.closed || self.failure.is_some() {
            return Err(region);
        }
        self.last_delivery = Instant::now();
        if region.is_empty() {
            return Ok(None);
        }
        tracing::trace!(
            len = region.len(),
            buffered = self.buffered + region.len(),
            "inbound delivery"
        );
        self.buffered += region.len();
        self.regions.push_back(region);
        Ok(self.try_complete())
    }

    /// Register a read of exactly `len` bytes.
    ///
    /// Returns a [`Ready`] when the read resolves immediately: enough bytes
    /// are queued, the transport has failed or closed, or another read is
    /// already pending. Otherwise the request is stored.
    pub(crate) fn request(&mut self, len: usize, completion: ReadCompletion) -> Option<Ready> {
        let refused = if self.closed {
            Some(TransportError::Closed)
        } else if let Some(err) = &self.failure {
            Some(err.clone())
        } else if self.pending.is_some() {
            tracing::warn!(len, "read issued while another read is pending");
            Some(TransportError::ReadAlreadyPending)
        } else {
            None
        };
        if let Some(err) = refused {
            return Some(Ready {
                completion,
                result: Err(err),
            });
        }
        self.pending = Some(PendingRead {
            len,
            issued: Instant::now(),
            completion,
        });
        self.try_complete()
    }

    fn try_complete(&mut self) -> Option<Ready> {
        let len = self.pending.as_ref()?.len;
        if self.buffered < len {
            return None;
        }
        let pending = self.pending.take()?;

        let mut assembled = CompositeBuffer::new();
        let mut need = len;
        while need > 0 {
            let Some(mut region) = self.regions.pop_front() else {
                break;
            };
            if region.len() <= need {
                need -= region.len();
                assembled.push(region);
            } else {
                // split shares the storage; the tail goes back to the head
                assembled.push(region.split_to(need));
                self.regions.push_front(region);
                need = 0;
            }
        }
        self.buffered -= len;

        tracing::trace!(len, regions = assembled.region_count(), "read satisfied");
        Some(Ready {
            completion: pending.completion,
            result: Ok(assembled),
        })
    }

    /// Enter the failed state, failing the pending read with `err`.
    ///
    /// Only the first failure is kept; later ones and failures after close
    /// are ignored.
    pub(crate) fn fail(&mut self, err: TransportError) -> Option<Ready> {
        if self.closed || self.failure.is_some() {
            return None;
        }
        tracing::debug!(error = %err, "transport failed");
        self.failure = Some(err.clone());
        let pending = self.pending.take()?;
        Some(Ready {
            completion: pending.completion,
            result: Err(err),
        })
    }

    /// Enter the closed state.
    ///
    /// Returns the queued regions for recycling and the abandoned pending
    /// completion, which the caller drops without invoking once the lock is
    /// released. Returns `None` if already closed.
    pub(crate) fn close(&mut self) -> Option<Closed> {
        if self.closed {
            return None;
        }
        self.closed = true;
        self.buffered = 0;
        Some(Closed {
            regions: self.regions.drain(..).collect(),
            abandoned: self.pending.take().map(|p| p.completion),
        })
    }

    /// When the idle-read timeout expires, if a read is pending.
    pub(crate) fn idle_deadline(&self, timeout: Duration) -> Option<Instant> {
        let pending = self.pending.as_ref()?;
        Some(pending.issued.max(self.last_delivery) + timeout)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn channel() -> (ReadCompletion, oneshot::Receiver<Result<CompositeBuffer>>) {
        let (tx, rx) = oneshot::channel();
        (ReadCompletion::Channel(tx), rx)
    }

    fn run(ready: Option<Ready>) {
        ready.unwrap().run();
    }

    fn sequence(start: u8, len: u8) -> Bytes {
        Bytes::from((start..start + len).collect::<Vec<u8>>())
    }

    #[test]
    fn test_reassembles_irregular_chunks() {
        let mut inbound = Inbound::new();
        let (first, mut rx1) = channel();
        assert!(inbound.request(7, first).is_none());

        assert!(inbound.deliver(sequence(0, 3)).unwrap().is_none());
        assert!(inbound.deliver(sequence(3, 1)).unwrap().is_none());
        run(inbound.deliver(sequence(4, 10)).unwrap());

        let got = rx1.try_recv().unwrap().unwrap();
        assert_eq!(got.to_vec(), (0..7).collect::<Vec<u8>>());
        assert_eq!(got.region_count(), 3);
        assert_eq!(inbound.buffered(), 7);

        let (second, mut rx2) = channel();
        run(inbound.request(7, second));
        let got = rx2.try_recv().unwrap().unwrap();
        assert_eq!(got.to_vec(), (7..14).collect::<Vec<u8>>());
        assert_eq!(inbound.buffered(), 0);
    }

    #[test]
    fn test_split_remainder_shares_storage() {
        let mut inbound = Inbound::new();
        let region = sequence(0, 10);
        let base = region.as_ptr() as usize;
        inbound.deliver(region).unwrap();

        let (first, mut rx1) = channel();
        run(inbound.request(4, first));
        let head = rx1.try_recv().unwrap().unwrap();
        assert_eq!(head.regions().next().unwrap().as_ptr() as usize, base);

        let (second, mut rx2) = channel();
        run(inbound.request(6, second));
        let tail = rx2.try_recv().unwrap().unwrap();
        assert_eq!(tail.regions().next().unwrap().as_ptr() as usize, base + 4);
    }

    #[test]
    fn test_zero_length_read_completes_immediately() {
        let mut inbound = Inbound::new();
        let (c, mut rx) = channel();
        run(inbound.request(0, c));
        assert!(rx.try_recv().unwrap().unwrap().is_empty());
    }

    #[test]
    fn test_second_request_fails_fast() {
        let mut inbound = Inbound::new();
        let (first, mut rx1) = channel();
        assert!(inbound.request(4, first).is_none());

        let (second, mut rx2) = channel();
        run(inbound.request(4, second));
        assert!(matches!(
            rx2.try_recv().unwrap(),
            Err(TransportError::ReadAlreadyPending)
        ));

        // the original request is untouched
        run(inbound.deliver(sequence(0, 4)).unwrap());
        assert_eq!(rx1.try_recv().unwrap().unwrap().len(), 4);
    }

    #[test]
    fn test_failure_is_sticky() {
        let mut inbound = Inbound::new();
        let (first, mut rx1) = channel();
        assert!(inbound.request(4, first).is_none());

        let timeout = Duration::from_millis(5);
        run(inbound.fail(TransportError::ReadTimeout(timeout)));
        assert!(matches!(
            rx1.try_recv().unwrap(),
            Err(TransportError::ReadTimeout(_))
        ));

        // a second failure does not replace the first
        assert!(inbound.fail(TransportError::Closed).is_none());

        let (second, mut rx2) = channel();
        run(inbound.request(1, second));
        assert!(matches!(
            rx2.try_recv().unwrap(),
            Err(TransportError::ReadTimeout(t)) if t == timeout
        ));
        assert!(inbound.deliver(sequence(0, 1)).is_err());
    }

    #[test]
    fn test_close_drops_pending_without_invoking() {
        let mut inbound = Inbound::new();
        let called = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&called);
        let callback = ReadCompletion::Callback(Box::new(move |_| {
            flag.store(true, Ordering::SeqCst);
        }));
        inbound.deliver(sequence(0, 2)).unwrap();
        assert!(inbound.request(8, callback).is_none());

        let closed = inbound.close().unwrap();
        assert_eq!(closed.regions.len(), 1);
        assert!(closed.abandoned.is_some());
        drop(closed);
        assert!(!called.load(Ordering::SeqCst));
        assert!(inbound.close().is_none());

        let (after, mut rx) = channel();
        run(inbound.request(1, after));
        assert!(matches!(rx.try_recv().unwrap(), Err(TransportError::Closed)));
        assert!(inbound.fail(TransportError::InterruptedWait).is_none());
    }

    #[test]
    fn test_saturation_ignores_pending_reads() {
        let mut inbound = Inbound::new();
        assert!(!inbound.is_saturated(4));
        inbound.deliver(sequence(0, 4)).unwrap();
        assert!(inbound.is_saturated(4));

        // a read larger than the queue must keep the reader going
        let (c, _rx) = channel();
        assert!(inbound.request(8, c).is_none());
        assert!(!inbound.is_saturated(4));
    }

    #[test]
    fn test_idle_deadline_only_while_pending() {
        let mut inbound = Inbound::new();
        let timeout = Duration::from_secs(1);
        assert!(inbound.idle_deadline(timeout).is_none());

        let (c, _rx) = channel();
        assert!(inbound.request(4, c).is_none());
        let first = inbound.idle_deadline(timeout).unwrap();

        std::thread::sleep(Duration::from_millis(5));
        assert!(inbound.deliver(sequence(0, 1)).unwrap().is_none());
        let second = inbound.idle_deadline(timeout).unwrap();
        assert!(second > first);
    }
}
