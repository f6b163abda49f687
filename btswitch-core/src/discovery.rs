/*!
 * Discovery stream
 * Time-boxed inquiry loop feeding a live picker
 *
 * Inquiry runs in short slices on a background task. Every time the set of
 * discovered devices changes, the whole snapshot is offered to the UI on a
 * bounded channel; if the UI is behind, the snapshot is dropped instead of
 * stalling the scan. The picker only opens once something was found.
 */

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::bluetooth::BluetoothPort;
use crate::device::Device;
use crate::error::{CoreError, Result};
use crate::picker::{DevicePicker, PickError};
use crate::progress::Progress;

/// Scan window used when the caller passes 0.
pub const DEFAULT_INQUIRY_SECS: u64 = 60;

/// Length of one inquiry call, independent of the total window.
pub const INQUIRY_SLICE_SECS: u64 = 3;

/// Stand-in deadline for windows too long to represent as an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

const SCAN_QUEUE: usize = 8;
const UI_QUEUE: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    ScanningSilent,
    ScanningWithUi,
    Done,
    Canceled,
    TimedOutNoDevices,
}

fn enter(phase: Phase) {
    debug!(?phase, "discovery");
}

/// Scans for up to `total_secs` (0 means `DEFAULT_INQUIRY_SECS`) and lets the
/// user pick one of the devices found.
///
/// Fails with `NotFound("no devices found")` without ever opening the picker
/// when the window closes empty. An inquiry error before the picker opens is
/// returned as is.
pub async fn pick_by_discovery(
    bluetooth: Arc<dyn BluetoothPort>,
    picker: &dyn DevicePicker,
    progress: &Progress,
    title: &str,
    total_secs: u64,
    cancel: &CancellationToken,
) -> Result<Device> {
    let total = if total_secs == 0 {
        DEFAULT_INQUIRY_SECS
    } else {
        total_secs
    };
    let now = Instant::now();
    let deadline = now
        .checked_add(Duration::from_secs(total))
        .unwrap_or(now + FAR_FUTURE);
    progress.line(format_args!("Searching nearby devices (up to {total}s)..."));
    enter(Phase::ScanningSilent);

    let scan_cancel = cancel.child_token();
    let _stop_scan = scan_cancel.clone().drop_guard();
    let (scan_tx, mut scan_rx) = mpsc::channel(SCAN_QUEUE);
    let scanner = tokio::spawn(scan(
        bluetooth,
        progress.clone(),
        scan_tx,
        deadline,
        scan_cancel.clone(),
    ));

    let first = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            enter(Phase::Canceled);
            return Err(CoreError::Canceled);
        }
        first = scan_rx.recv() => first,
        _ = sleep_until(deadline) => None,
    };

    let Some(first) = first.filter(|snapshot| !snapshot.is_empty()) else {
        scan_cancel.cancel();
        if let Ok(Err(err)) = scanner.await {
            return Err(err);
        }
        enter(Phase::TimedOutNoDevices);
        return Err(CoreError::not_found("no devices found"));
    };

    enter(Phase::ScanningWithUi);
    let (ui_tx, ui_rx) = mpsc::channel(UI_QUEUE);
    // Fresh channel, cannot be full.
    let _ = ui_tx.try_send(first);
    let forward_cancel = cancel.child_token();
    let _stop_forward = forward_cancel.clone().drop_guard();
    tokio::spawn(forward(scan_rx, ui_tx, forward_cancel));

    let picked = {
        let _hold = progress.gate().hold();
        picker.pick_from_stream(title, ui_rx, cancel).await
    };

    let picked = match picked {
        Ok(device) => device,
        Err(err) => {
            if matches!(err, PickError::Canceled) {
                enter(Phase::Canceled);
            }
            return Err(err.into());
        }
    };
    if picked.address.trim().is_empty() {
        return Err(CoreError::EmptyAddress);
    }
    enter(Phase::Done);
    Ok(picked)
}

async fn scan(
    bluetooth: Arc<dyn BluetoothPort>,
    progress: Progress,
    updates: mpsc::Sender<Vec<Device>>,
    deadline: Instant,
    cancel: CancellationToken,
) -> Result<()> {
    let mut seen = BTreeMap::new();
    let mut tick = 0u32;

    loop {
        if cancel.is_cancelled() || Instant::now() >= deadline {
            return Ok(());
        }
        tick += 1;
        progress.line(format_args!(
            "  inquiry tick {tick} (chunk={INQUIRY_SLICE_SECS}s)"
        ));

        let found = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            _ = sleep_until(deadline) => return Ok(()),
            found = bluetooth.inquiry(INQUIRY_SLICE_SECS) => found,
        };
        let found = match found {
            Ok(found) => found,
            Err(err) => {
                progress.line(format_args!("  inquiry error: {err}"));
                return Err(err.into());
            }
        };

        if !merge(&mut seen, found) {
            progress.line("  found 0 new device(s)");
            continue;
        }

        let snapshot: Vec<Device> = seen.values().cloned().collect();
        progress.line(format_args!("  found {} device(s)", snapshot.len()));
        match updates.try_send(snapshot) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => debug!("ui behind, dropped snapshot"),
            Err(TrySendError::Closed(_)) => return Ok(()),
        }
    }
}

/// Relays snapshots to the picker, dropping them when it falls behind.
async fn forward(
    mut from: mpsc::Receiver<Vec<Device>>,
    to: mpsc::Sender<Vec<Device>>,
    cancel: CancellationToken,
) {
    loop {
        let snapshot = tokio::select! {
            _ = cancel.cancelled() => return,
            next = from.recv() => match next {
                Some(snapshot) => snapshot,
                None => return,
            },
        };
        if let Err(TrySendError::Closed(_)) = to.try_send(snapshot) {
            return;
        }
    }
}

/// Folds one inquiry result into the running set, keyed by address with the
/// latest sighting winning. Entries without a name or address are skipped.
/// Returns whether the set changed.
fn merge(seen: &mut BTreeMap<String, Device>, found: Vec<Device>) -> bool {
    let mut changed = false;
    for device in found {
        if !device.is_addressable() {
            continue;
        }
        let previous = seen.insert(device.address.clone(), device.clone());
        if previous.as_ref() != Some(&device) {
            changed = true;
        }
    }
    changed
}
