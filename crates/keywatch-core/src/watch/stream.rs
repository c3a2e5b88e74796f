//! Consumer side of a watch session: the change stream and its cancel handle.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use strum::{AsRefStr, Display};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::WatchMessage;

/// Lifecycle of a watch session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(AsRefStr, Display)]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    /// Resolving the client and building the watch plan.
    Initializing,
    /// The long-poll loop is running.
    Running,
    /// Cancellation or a failure was observed; the loop is winding down.
    Stopping,
    /// The loop has exited and the stream is closed. Terminal.
    Closed,
}

/// Bounded stream of [`WatchMessage`]s produced by one session.
///
/// The stream holds at most one undelivered message. Once the session has been
/// cancelled it yields nothing further, even if a message is still buffered.
#[derive(Debug)]
pub struct ChangeStream {
    rx: mpsc::Receiver<WatchMessage>,
    cancel: CancellationToken,
}

impl ChangeStream {
    pub(crate) fn new(rx: mpsc::Receiver<WatchMessage>, cancel: CancellationToken) -> Self {
        Self { rx, cancel }
    }

    /// Receives the next message, or `None` once the stream is closed.
    pub async fn recv(&mut self) -> Option<WatchMessage> {
        if self.cancel.is_cancelled() {
            self.rx.close();
            return None;
        }

        tokio::select! {
            biased;

            () = self.cancel.cancelled() => {
                self.rx.close();
                None
            }
            message = self.rx.recv() => message,
        }
    }
}

impl Stream for ChangeStream {
    type Item = WatchMessage;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.cancel.is_cancelled() {
            self.rx.close();
            return Poll::Ready(None);
        }
        self.rx.poll_recv(cx)
    }
}

/// Cancellation control and state observer for a watch session.
///
/// Cloning the handle shares the same session.
#[derive(Debug, Clone)]
pub struct WatchHandle {
    cancel: CancellationToken,
    state: watch::Receiver<SessionState>,
}

impl WatchHandle {
    pub(crate) fn new(cancel: CancellationToken, state: watch::Receiver<SessionState>) -> Self {
        Self { cancel, state }
    }

    /// Signals the session to stop.
    ///
    /// Safe to call more than once and after the session closed on its own.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns true once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Returns the current session state.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Waits until the long-poll loop has exited and the stream is closed.
    pub async fn closed(&self) {
        let mut state = self.state.clone();
        // The sender only goes away after publishing `Closed`.
        let _ = state.wait_for(|s| *s == SessionState::Closed).await;
    }
}
