//! Watch session: the long-poll loop bridged onto a bounded change stream.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use super::{ChangeStream, SessionState, WatchHandle, WatchOptions, WatchPlan};
use crate::store::{BlockingResponse, KvPair, StoreClient, WatchIndex};
use crate::{Error, TRACING_TARGET_WATCH, WatchMessage};

/// Capacity of the outbound stream. One slot: a fast-changing key is
/// coalesced by the store rather than buffered here.
const STREAM_CAPACITY: usize = 1;

/// Outcome of handing a message to the consumer.
enum Delivery {
    Delivered,
    Cancelled,
    ConsumerGone,
}

/// A single, non-restartable watch over one key.
///
/// The session owns the long-poll loop. Each blocking query carries the cursor
/// returned by the previous one; a response with an unchanged cursor is a
/// liveness re-poll and produces no message, and so is a moved cursor whose
/// result equals the last delivered one. Every genuine change is forwarded
/// to the consumer, racing the cancellation signal while the single-slot
/// stream is full. The stream is closed exactly once, when the loop exits.
pub struct WatchSession<S: StoreClient> {
    client: Arc<S>,
    plan: WatchPlan,
    options: WatchOptions,
    outbound: mpsc::Sender<WatchMessage>,
    cancel: CancellationToken,
    state: watch::Sender<SessionState>,
}

impl<S: StoreClient> WatchSession<S> {
    /// Starts watching `plan` through `client` on a background task.
    ///
    /// Must be called within a Tokio runtime.
    pub fn start(
        client: Arc<S>,
        plan: WatchPlan,
        options: WatchOptions,
    ) -> (ChangeStream, WatchHandle) {
        let (outbound, rx) = mpsc::channel(STREAM_CAPACITY);
        let (state, state_rx) = watch::channel(SessionState::Initializing);
        let cancel = CancellationToken::new();

        let stream = ChangeStream::new(rx, cancel.clone());
        let handle = WatchHandle::new(cancel.clone(), state_rx);

        let session = Self {
            client,
            plan,
            options,
            outbound,
            cancel,
            state,
        };
        tokio::spawn(session.run());

        (stream, handle)
    }

    /// Builds the already-closed session returned when setup fails.
    ///
    /// The stream yields `error` once and then ends; no loop is started.
    pub fn failed(error: Error) -> (ChangeStream, WatchHandle) {
        let (outbound, rx) = mpsc::channel(STREAM_CAPACITY);
        let (_, state_rx) = watch::channel(SessionState::Closed);
        let cancel = CancellationToken::new();

        // Capacity is one and the channel is fresh, so this cannot fail.
        let _ = outbound.try_send(WatchMessage::error(error));
        drop(outbound);

        (
            ChangeStream::new(rx, cancel.clone()),
            WatchHandle::new(cancel, state_rx),
        )
    }

    async fn run(self) {
        let Self {
            client,
            plan,
            options,
            outbound,
            cancel,
            state,
        } = self;

        let key = plan.watched_key();
        let wait = options.effective_wait_time();
        let mut cursor = WatchIndex::ZERO;
        let mut primed = false;
        let mut last: Option<Option<KvPair>> = None;

        state.send_replace(SessionState::Running);
        tracing::debug!(
            target: TRACING_TARGET_WATCH,
            key = %key,
            wait_ms = wait.as_millis(),
            "Watch session started"
        );

        loop {
            let result = tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    tracing::debug!(
                        target: TRACING_TARGET_WATCH,
                        key = %key,
                        "Watch session cancelled"
                    );
                    break;
                }
                result = client.blocking_watch(key, cursor, wait) => result,
            };

            let BlockingResponse { index, pair } = match result {
                Ok(response) => response,
                Err(err) if !primed => {
                    tracing::warn!(
                        target: TRACING_TARGET_WATCH,
                        key = %key,
                        error = %err,
                        "Watch failed before the first response"
                    );
                    state.send_replace(SessionState::Stopping);
                    deliver(&outbound, &cancel, WatchMessage::error(err)).await;
                    break;
                }
                Err(err) => {
                    tracing::error!(
                        target: TRACING_TARGET_WATCH,
                        key = %key,
                        cursor = %cursor,
                        error = %err,
                        "Watch loop failed"
                    );
                    state.send_replace(SessionState::Stopping);
                    if options.report_background_errors {
                        let error = Error::background()
                            .with_message("watch loop ended")
                            .with_context(key.to_owned())
                            .with_source(err);
                        deliver(&outbound, &cancel, WatchMessage::error(error)).await;
                    }
                    break;
                }
            };

            let next = cursor.advance(index);
            if primed && next == cursor {
                tracing::trace!(
                    target: TRACING_TARGET_WATCH,
                    key = %key,
                    cursor = %cursor,
                    "Long-poll returned without change"
                );
                continue;
            }
            cursor = next;
            primed = true;

            // The store may move the index for writes elsewhere, e.g. a
            // missing key reports the store-wide index.
            if last.as_ref() == Some(&pair) {
                tracing::trace!(
                    target: TRACING_TARGET_WATCH,
                    key = %key,
                    cursor = %cursor,
                    "Index moved without a change to the key"
                );
                continue;
            }
            last = Some(pair.clone());

            let message = match pair {
                Some(pair) => WatchMessage::value(pair.value),
                None => WatchMessage::absent(),
            };

            tracing::debug!(
                target: TRACING_TARGET_WATCH,
                key = %key,
                cursor = %cursor,
                absent = message.is_absent(),
                "Key changed"
            );

            match deliver(&outbound, &cancel, message).await {
                Delivery::Delivered => {}
                Delivery::Cancelled => break,
                Delivery::ConsumerGone => {
                    tracing::debug!(
                        target: TRACING_TARGET_WATCH,
                        key = %key,
                        "Change stream dropped, stopping watch"
                    );
                    break;
                }
            }
        }

        state.send_if_modified(|current| {
            let changed = *current != SessionState::Stopping;
            *current = SessionState::Stopping;
            changed
        });
        drop(outbound);
        state.send_replace(SessionState::Closed);

        tracing::debug!(
            target: TRACING_TARGET_WATCH,
            key = %key,
            "Watch session closed"
        );
    }
}

/// Offers `message` to the consumer until it is taken or the session is cancelled.
async fn deliver(
    outbound: &mpsc::Sender<WatchMessage>,
    cancel: &CancellationToken,
    message: WatchMessage,
) -> Delivery {
    tokio::select! {
        biased;

        () = cancel.cancelled() => Delivery::Cancelled,
        sent = outbound.send(message) => match sent {
            Ok(()) => Delivery::Delivered,
            Err(_) => Delivery::ConsumerGone,
        },
    }
}

impl<S: StoreClient> std::fmt::Debug for WatchSession<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchSession")
            .field("plan", &self.plan)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
