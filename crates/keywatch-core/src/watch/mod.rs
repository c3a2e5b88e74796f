//! Long-poll watches bridged onto push-style change streams.
//!
//! This module provides:
//! - [`WatchPlan`]: a validated single-key watch specification
//! - [`WatchSession`]: the background long-poll loop and its bounded stream
//! - [`ChangeStream`] / [`WatchHandle`]: the consumer and control ends
//!
//! # Delivery guarantees
//!
//! Messages arrive in the order the loop observed them. The stream holds a
//! single message: while it is full the loop waits, and changes made in the
//! meantime collapse into the value the next blocking query returns. The most
//! recent value observed before cancellation is eventually delivered;
//! intermediate values may be skipped.
//!
//! Failures before the first long-poll response are delivered as one error
//! message. Failures after it end the stream without a terminal message
//! (unless [`WatchOptions::report_background_errors`] is set) and are only
//! visible in the logs.
//!
//! # Example
//!
//! ```rust,ignore
//! let plan = WatchPlan::key("config.json")?;
//! let (mut stream, handle) = WatchSession::start(client, plan, WatchOptions::default());
//!
//! while let Some(message) = stream.recv().await {
//!     match message.into_result()? {
//!         Some(value) => apply(value),
//!         None => reset(),
//!     }
//! }
//! handle.cancel();
//! ```

mod options;
mod plan;
mod session;
mod stream;

pub use options::{DEFAULT_WAIT_TIME, WatchOptions};
pub use plan::{WatchKind, WatchParams, WatchPlan};
pub use session::WatchSession;
pub use stream::{ChangeStream, SessionState, WatchHandle};
