use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::Poll;

use futures::future::poll_fn;
use futures::task::AtomicWaker;

/// Cooperative stop request shared between the interrupt handler and the sync loop.
///
/// Cloning yields a handle to the same token. Once stopped, a token stays stopped.
#[derive(Debug, Clone, Default)]
pub struct StopToken {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    stopped: AtomicBool,
    waker: AtomicWaker,
}

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::Release);
        self.inner.waker.wake();
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::Acquire)
    }

    /// Resolves once [`StopToken::stop`] has been called.
    ///
    /// Only the most recently polled waiter is woken, which is enough for the
    /// single sync loop that waits on it.
    pub fn stopped(&self) -> impl Future<Output = ()> + '_ {
        poll_fn(move |cx| {
            if self.is_stopped() {
                return Poll::Ready(());
            }
            self.inner.waker.register(cx.waker());
            if self.is_stopped() {
                Poll::Ready(())
            } else {
                Poll::Pending
            }
        })
    }
}
