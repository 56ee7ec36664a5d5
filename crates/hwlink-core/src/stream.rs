// ── Reactive state streams ──
//
// Subscription handle for consumers that render connection state.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::state::ConnectionState;

/// A subscription to the session's connection state.
///
/// Offers point-in-time access plus change notification via
/// [`changed()`](Self::changed) or by converting into a `Stream`.
pub struct ConnectionStateStream {
    current: ConnectionState,
    receiver: watch::Receiver<ConnectionState>,
}

impl ConnectionStateStream {
    pub(crate) fn new(receiver: watch::Receiver<ConnectionState>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// State captured at creation or at the last `changed()`.
    pub fn current(&self) -> &ConnectionState {
        &self.current
    }

    pub fn latest(&self) -> ConnectionState {
        self.receiver.borrow().clone()
    }

    /// Wait for the next transition. `None` once the session is gone.
    pub async fn changed(&mut self) -> Option<ConnectionState> {
        self.receiver.changed().await.ok()?;
        let state = self.receiver.borrow_and_update().clone();
        self.current = state.clone();
        Some(state)
    }

    /// Wait until `predicate` holds, returning the matching state.
    pub async fn wait_for(
        &mut self,
        mut predicate: impl FnMut(&ConnectionState) -> bool,
    ) -> Option<ConnectionState> {
        let state = self.receiver.wait_for(|s| predicate(s)).await.ok()?.clone();
        self.current = state.clone();
        Some(state)
    }

    pub fn into_stream(self) -> ConnectionWatchStream {
        ConnectionWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter yielding every published connection state.
pub struct ConnectionWatchStream {
    inner: WatchStream<ConnectionState>,
}

impl Stream for ConnectionWatchStream {
    type Item = ConnectionState;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
