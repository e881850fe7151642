//! Cancellation/timeout composition
//!
//! Folds the caller's signal and the request deadline into the one
//! effective signal plugins and loops observe.

use std::time::Duration;

use contracts::{AbortReason, AbortSignal};
use tokio::task::JoinHandle;
use tracing::debug;

/// Effective signal of one request
///
/// Owns the deadline watcher; dropping it stops the watcher, so no timer
/// outlives the request.
#[derive(Debug)]
pub struct ComposedSignal {
    signal: AbortSignal,
    watcher: Option<JoinHandle<()>>,
}

impl ComposedSignal {
    pub fn signal(&self) -> &AbortSignal {
        &self.signal
    }

    /// Whether a deadline watcher is still pending
    pub fn has_pending_deadline(&self) -> bool {
        self.watcher
            .as_ref()
            .is_some_and(|watcher| !watcher.is_finished())
    }
}

impl Drop for ComposedSignal {
    fn drop(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
    }
}

/// Deadline from a millisecond count, `0` meaning none
pub fn scan_timeout_ms(timeout_ms: u64) -> Option<Duration> {
    (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms))
}

/// Compose the effective signal of a request
///
/// Returns `None` when nothing can ever cancel the request. A caller signal
/// that is already triggered yields an already-triggered effective signal
/// with the caller's reason. Must be called within a Tokio runtime when a
/// deadline is given.
pub fn compose_signal(
    caller: Option<&AbortSignal>,
    timeout: Option<Duration>,
) -> Option<ComposedSignal> {
    let timeout = timeout.filter(|timeout| !timeout.is_zero());

    match (caller, timeout) {
        (None, None) => None,
        (Some(caller), None) => Some(ComposedSignal {
            signal: caller.clone(),
            watcher: None,
        }),
        (caller, Some(timeout)) => {
            if let Some(reason) = caller.and_then(AbortSignal::reason) {
                return Some(ComposedSignal {
                    signal: AbortSignal::aborted_with(reason.clone()),
                    watcher: None,
                });
            }

            let signal = AbortSignal::new();
            let watcher = tokio::spawn(watch_deadline(
                signal.clone(),
                caller.cloned(),
                timeout,
            ));
            Some(ComposedSignal {
                signal,
                watcher: Some(watcher),
            })
        }
    }
}

/// Abort `effective` on the caller's abort or the deadline, whichever is first
async fn watch_deadline(effective: AbortSignal, caller: Option<AbortSignal>, timeout: Duration) {
    let reason = match caller {
        Some(caller) => tokio::select! {
            biased;
            _ = caller.aborted() => caller_reason(&caller),
            _ = tokio::time::sleep(timeout) => timeout_reason(timeout),
        },
        None => {
            tokio::time::sleep(timeout).await;
            timeout_reason(timeout)
        }
    };

    let code = reason.code();
    if effective.abort(reason) {
        debug!(code, "Effective signal aborted");
    }
}

fn caller_reason(caller: &AbortSignal) -> AbortReason {
    caller.reason().cloned().unwrap_or_else(AbortReason::cancelled)
}

fn timeout_reason(timeout: Duration) -> AbortReason {
    AbortReason::Timeout {
        timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::SCAN_TIMEOUT;

    #[tokio::test]
    async fn test_nothing_to_compose() {
        assert!(compose_signal(None, None).is_none());
        assert!(compose_signal(None, Some(Duration::ZERO)).is_none());
    }

    #[tokio::test]
    async fn test_caller_only_shares_caller_state() {
        let caller = AbortSignal::new();
        let composed = compose_signal(Some(&caller), None).unwrap();
        assert!(!composed.signal().is_aborted());

        caller.abort(AbortReason::cancelled_with("closed"));
        assert!(composed.signal().is_aborted());
        assert_eq!(
            composed.signal().reason(),
            Some(&AbortReason::cancelled_with("closed"))
        );
    }

    #[tokio::test]
    async fn test_pre_aborted_caller_wins_immediately() {
        let caller = AbortSignal::new();
        caller.cancel();

        let composed = compose_signal(Some(&caller), Some(Duration::from_millis(10))).unwrap();
        assert!(composed.signal().is_aborted());
        assert!(!composed.signal().is_timeout());
        assert!(!composed.has_pending_deadline());
    }

    #[tokio::test]
    async fn test_deadline_aborts_with_timeout() {
        let composed = compose_signal(None, Some(Duration::from_millis(30))).unwrap();
        let started = std::time::Instant::now();

        composed.signal().aborted().await;

        assert!(started.elapsed() >= Duration::from_millis(25));
        assert!(composed.signal().is_timeout());
        let err = composed.signal().to_error().unwrap();
        assert_eq!(err.code(), SCAN_TIMEOUT);
        assert_eq!(err.to_string(), "scan timed out after 30ms");
    }

    #[tokio::test]
    async fn test_caller_abort_before_deadline() {
        let caller = AbortSignal::new();
        let composed = compose_signal(Some(&caller), Some(Duration::from_secs(10))).unwrap();

        let trigger = caller.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.abort(AbortReason::cancelled_with("user"));
        });

        tokio::time::timeout(Duration::from_secs(2), composed.signal().aborted())
            .await
            .unwrap();
        assert_eq!(
            composed.signal().reason(),
            Some(&AbortReason::cancelled_with("user"))
        );

        // the watcher exits right after forwarding the abort
        for _ in 0..10 {
            if !composed.has_pending_deadline() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(!composed.has_pending_deadline());
    }

    #[tokio::test]
    async fn test_drop_stops_deadline() {
        let composed = compose_signal(None, Some(Duration::from_millis(20))).unwrap();
        let effective = composed.signal().clone();
        assert!(composed.has_pending_deadline());
        drop(composed);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!effective.is_aborted());
    }

    #[test]
    fn test_scan_timeout_ms() {
        assert_eq!(scan_timeout_ms(0), None);
        assert_eq!(scan_timeout_ms(50), Some(Duration::from_millis(50)));
    }
}
