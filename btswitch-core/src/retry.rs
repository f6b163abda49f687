/*!
 * Connect with retry and verification
 * Bounded by an attempt count and a single shared wait budget
 */

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::bluetooth::BluetoothPort;
use crate::error::{or_canceled, CoreError, Result};
use crate::progress::Progress;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Longest single wait-connect call.
pub const WAIT_CHUNK_SECS: u64 = 5;

/// Seconds left to spend waiting for a connection, across all attempts.
///
/// Never reset and never negative, so total waiting stays bounded no matter
/// how many attempts run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitBudget {
    remaining: u64,
}

impl WaitBudget {
    pub fn new(secs: u64) -> Self {
        Self { remaining: secs }
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// Timeout for the next wait-connect call.
    pub fn next_chunk(&self) -> u64 {
        self.remaining.min(WAIT_CHUNK_SECS)
    }

    /// Deducts whole elapsed seconds.
    pub fn spend(&mut self, elapsed: Duration) {
        self.remaining = self.remaining.saturating_sub(elapsed.as_secs());
    }
}

/// Connects to `address` and confirms the link, retrying up to `max_attempts`
/// times (0 means `DEFAULT_MAX_ATTEMPTS`).
///
/// A failed connect or wait does not abort the loop. On exhaustion the last
/// recorded error is returned.
pub async fn connect_with_retry_verify(
    bluetooth: &dyn BluetoothPort,
    progress: &Progress,
    address: &str,
    wait_connect_secs: u64,
    max_attempts: u32,
    cancel: &CancellationToken,
) -> Result<()> {
    let attempts = if max_attempts == 0 {
        DEFAULT_MAX_ATTEMPTS
    } else {
        max_attempts
    };
    let mut budget = WaitBudget::new(wait_connect_secs);
    let mut last_err: Option<CoreError> = None;

    for attempt in 1..=attempts {
        progress.line(format_args!("Connecting (attempt {attempt}/{attempts})..."));

        if let Err(err) = or_canceled(cancel, async {
            bluetooth.connect(address).await.map_err(CoreError::from)
        })
        .await
        {
            if err.is_canceled() {
                return Err(err);
            }
            progress.line(format_args!("  connect failed: {err}"));
            last_err = Some(err);
            continue;
        }

        if !budget.is_exhausted() {
            let chunk = budget.next_chunk();
            progress.line(format_args!(
                "  waiting for connection (up to {chunk}s now; remaining budget {}s)...",
                budget.remaining()
            ));
            let started = Instant::now();
            let waited = or_canceled(cancel, async {
                bluetooth
                    .wait_connect(address, chunk)
                    .await
                    .map_err(CoreError::from)
            })
            .await;
            budget.spend(started.elapsed());
            debug!(address, remaining = budget.remaining(), "wait budget");

            if let Err(err) = waited {
                if err.is_canceled() {
                    return Err(err);
                }
                progress.line(format_args!("  wait-connect failed: {err}"));
                report_link_state(bluetooth, progress, address).await;
                last_err = Some(err);
                continue;
            }
        }

        let verified = or_canceled(cancel, async {
            bluetooth
                .is_connected(address)
                .await
                .map_err(CoreError::from)
        })
        .await;
        match verified {
            Ok(true) => {
                progress.line("  connected confirmed");
                return Ok(());
            }
            Ok(false) => {
                progress.line("  connect verification failed: device is not connected");
                last_err = Some(CoreError::NotConnected);
            }
            Err(err) if err.is_canceled() => return Err(err),
            Err(err) => {
                progress.line(format_args!("  connect verification failed: {err}"));
                last_err = Some(err);
            }
        }
    }

    Err(last_err.unwrap_or(CoreError::ConnectFailed))
}

/// Diagnostics after a failed wait; errors here are ignored.
async fn report_link_state(bluetooth: &dyn BluetoothPort, progress: &Progress, address: &str) {
    if let Ok(connected) = bluetooth.is_connected(address).await {
        progress.line(format_args!("  is-connected={connected}"));
    }
    if let Ok(devices) = bluetooth.connected_devices().await {
        progress.line(format_args!("  connected devices: {}", devices.len()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBluetooth;

    async fn run(bt: &FakeBluetooth, wait_secs: u64, attempts: u32) -> Result<()> {
        connect_with_retry_verify(
            bt,
            &Progress::silent(),
            "AA",
            wait_secs,
            attempts,
            &CancellationToken::new(),
        )
        .await
    }

    #[test]
    fn budget_never_goes_negative() {
        let mut budget = WaitBudget::new(7);
        assert_eq!(budget.next_chunk(), 5);
        budget.spend(Duration::from_millis(5_900));
        assert_eq!(budget.remaining(), 2);
        assert_eq!(budget.next_chunk(), 2);
        budget.spend(Duration::from_secs(10));
        assert_eq!(budget.remaining(), 0);
        assert!(budget.is_exhausted());
    }

    #[tokio::test]
    async fn never_verified_uses_every_attempt() {
        let bt = FakeBluetooth::default();
        let err = run(&bt, 0, 4).await.unwrap_err();
        assert!(matches!(err, CoreError::NotConnected));
        assert_eq!(bt.get(|s| s.connected.len()), 4);
        assert!(bt.get(|s| s.waits.is_empty()));
    }

    #[tokio::test]
    async fn zero_attempts_means_three() {
        let bt = FakeBluetooth::default();
        run(&bt, 0, 0).await.unwrap_err();
        assert_eq!(bt.get(|s| s.connected.len()), 3);
    }

    #[tokio::test]
    async fn verified_connection_stops_immediately() {
        let bt = FakeBluetooth::default();
        bt.set(|s| s.is_connected = true);
        run(&bt, 10, 6).await.unwrap();
        assert_eq!(bt.get(|s| s.connected.len()), 1);
        assert_eq!(bt.get(|s| s.waits.clone()), [("AA".to_string(), 5)]);
    }

    #[tokio::test]
    async fn connect_errors_do_not_abort_the_loop() {
        let bt = FakeBluetooth::default();
        bt.set(|s| s.connect_err = Some("page timeout".into()));
        let err = run(&bt, 10, 3).await.unwrap_err();
        assert_eq!(err.to_string(), "page timeout");
        assert!(bt.get(|s| s.waits.is_empty()));
        assert_eq!(bt.get(|s| s.is_connected_calls), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_budget_is_shared_across_attempts() {
        let bt = FakeBluetooth::default();
        bt.set(|s| s.wait_sleeps = true);
        run(&bt, 12, 5).await.unwrap_err();

        let waits: Vec<u64> = bt.get(|s| s.waits.iter().map(|(_, secs)| *secs).collect());
        assert_eq!(waits, [5, 5, 2]);
        assert_eq!(bt.get(|s| s.connected.len()), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_failures_are_recorded_and_retried() {
        let bt = FakeBluetooth::default();
        bt.set(|s| {
            s.wait_sleeps = true;
            s.wait_err = Some("timed out waiting".into());
        });
        let err = run(&bt, 6, 3).await.unwrap_err();
        // The last attempt had no budget left, so verification produced the final error.
        assert!(matches!(err, CoreError::NotConnected));
        let waits: Vec<u64> = bt.get(|s| s.waits.iter().map(|(_, secs)| *secs).collect());
        assert_eq!(waits, [5, 1]);
    }

    #[tokio::test]
    async fn cancellation_stops_retrying() {
        let bt = FakeBluetooth::default();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = connect_with_retry_verify(&bt, &Progress::silent(), "AA", 0, 3, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Canceled));
        assert!(bt.get(|s| s.connected.is_empty()));
    }
}
