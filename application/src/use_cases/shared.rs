//! Shared utilities for use cases.

use tokio_util::sync::CancellationToken;

/// Check if cancellation has been requested.
pub(crate) fn is_cancelled(token: &Option<CancellationToken>) -> bool {
    token.as_ref().is_some_and(CancellationToken::is_cancelled)
}

/// Await `future` unless the token fires first.
///
/// Returns `None` when cancelled; the future is dropped.
pub(crate) async fn cancellable<F: Future>(
    token: &Option<CancellationToken>,
    future: F,
) -> Option<F::Output> {
    match token {
        Some(token) => tokio::select! {
            _ = token.cancelled() => None,
            output = future => Some(output),
        },
        None => Some(future.await),
    }
}
