//! Span and task-local context.
//!
//! The process-wide `peer` span carries the run mode and build SHA. HTTP
//! requests scope their `x-request-id` in a task-local so handlers can tag
//! their own events with it.

use std::future::Future;
use std::sync::Arc;

use tracing::span::EnteredSpan;
use tracing::{Span, field};

use crate::init::build_sha;

/// Keeps the `peer` span entered until dropped.
#[derive(Debug)]
pub struct GlobalContextGuard {
    _span: EnteredSpan,
}

impl GlobalContextGuard {
    /// Enter the `peer` span in `mode`.
    #[must_use]
    pub fn new(mode: &str) -> Self {
        let span = tracing::info_span!("peer", mode = %mode, build_sha = %build_sha());
        Self {
            _span: span.entered(),
        }
    }
}

/// Update the `mode` field of the current span (e.g. `serving`).
pub fn record_app_mode(mode: &str) {
    Span::current().record("mode", field::display(mode));
}

tokio::task_local! {
    static REQUEST_ID: Arc<str>;
}

/// Request id scoped by [`with_request_id`] for the current task.
#[must_use]
pub fn current_request_id() -> Option<String> {
    REQUEST_ID.try_with(ToString::to_string).ok()
}

/// Run `fut` with `request_id` visible to [`current_request_id`].
pub async fn with_request_id<Fut, T>(request_id: impl Into<String>, fut: Fut) -> T
where
    Fut: Future<Output = T>,
{
    REQUEST_ID.scope(Arc::from(request_id.into()), fut).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_enters_peer_span_until_dropped() {
        let guard = GlobalContextGuard::new("startup");
        record_app_mode("serving");
        drop(guard);
    }

    #[tokio::test]
    async fn request_id_is_scoped_to_the_future() {
        assert!(current_request_id().is_none());
        let seen = with_request_id("req-42", async { current_request_id() }).await;
        assert_eq!(seen.as_deref(), Some("req-42"));
        assert!(current_request_id().is_none());
    }
}
