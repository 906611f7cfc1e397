//! One-shot completion signal for the handshake outcome.
//!
//! [`completion`] returns a paired [`Resolver`] and [`Completion`]. The
//! resolver is held by the connection handler and consumed by
//! [`Resolver::resolve`], so a result can be delivered at most once; the
//! type system rules out double resolution. Dropping a resolver without
//! resolving it delivers [`Error::ConnectionClosed`], so a torn-down
//! connection can never leave a waiter hanging.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Condvar, Mutex};
use std::task::{Context, Poll, Waker};

use crate::error::Error;

struct Shared {
    state: Mutex<State>,
    condvar: Condvar,
}

struct State {
    outcome: Option<Result<(), Error>>,
    waker: Option<Waker>,
}

/// Create a linked resolver/completion pair.
pub fn completion() -> (Resolver, Completion) {
    let shared = Arc::new(Shared {
        state: Mutex::new(State {
            outcome: None,
            waker: None,
        }),
        condvar: Condvar::new(),
    });
    (
        Resolver {
            shared: Arc::clone(&shared),
            resolved: false,
        },
        Completion { shared },
    )
}

/// Producing half of the signal. Consumed on resolution.
pub struct Resolver {
    shared: Arc<Shared>,
    resolved: bool,
}

impl Resolver {
    /// Deliver the outcome and consume the resolver.
    pub fn resolve(mut self, outcome: Result<(), Error>) {
        self.resolved = true;
        self.deliver(outcome);
    }

    fn deliver(&self, outcome: Result<(), Error>) {
        let waker = {
            let mut state = self.shared.state.lock().unwrap_or_else(|e| e.into_inner());
            state.outcome = Some(outcome);
            state.waker.take()
        };
        self.shared.condvar.notify_all();
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

impl Drop for Resolver {
    fn drop(&mut self) {
        if !self.resolved {
            self.deliver(Err(Error::ConnectionClosed));
        }
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("resolved", &self.resolved)
            .finish()
    }
}

/// Consuming half of the signal.
///
/// Await it as a [`Future`], or block on [`Completion::wait`].
pub struct Completion {
    shared: Arc<Shared>,
}

impl Completion {
    /// Block the current thread until the outcome arrives.
    pub fn wait(self) -> Result<(), Error> {
        let mut state = self.shared.state.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if let Some(outcome) = state.outcome.take() {
                return outcome;
            }
            state = self
                .shared
                .condvar
                .wait(state)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Check for an outcome without blocking.
    pub fn try_take(&mut self) -> Option<Result<(), Error>> {
        let mut state = self.shared.state.lock().unwrap_or_else(|e| e.into_inner());
        state.outcome.take()
    }
}

impl Future for Completion {
    type Output = Result<(), Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.shared.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(outcome) = state.outcome.take() {
            Poll::Ready(outcome)
        } else {
            state.waker = Some(cx.waker().clone());
            Poll::Pending
        }
    }
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_delivers_success() {
        let (resolver, completion) = completion();
        resolver.resolve(Ok(()));
        assert!(completion.wait().is_ok());
    }

    #[test]
    fn resolve_delivers_error() {
        let (resolver, completion) = completion();
        resolver.resolve(Err(Error::ConnectionClosed));
        assert!(matches!(completion.wait(), Err(Error::ConnectionClosed)));
    }

    #[test]
    fn dropped_resolver_yields_connection_closed() {
        let (resolver, completion) = completion();
        drop(resolver);
        assert!(matches!(completion.wait(), Err(Error::ConnectionClosed)));
    }

    #[test]
    fn try_take_before_and_after_resolution() {
        let (resolver, mut completion) = completion();
        assert!(completion.try_take().is_none());
        resolver.resolve(Ok(()));
        assert!(matches!(completion.try_take(), Some(Ok(()))));
        assert!(completion.try_take().is_none());
    }

    #[test]
    fn wait_across_threads() {
        let (resolver, completion) = completion();
        let handle = std::thread::spawn(move || completion.wait());
        resolver.resolve(Ok(()));
        assert!(handle.join().unwrap().is_ok());
    }
}
