/*!
 * Interactive selection contract
 */

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::device::Device;
use crate::progress::TerminalGate;

#[derive(Debug, Error)]
pub enum PickError {
    /// The user dismissed the picker, or the caller cancelled it.
    #[error("canceled")]
    Canceled,

    #[error("picker terminal error: {0}")]
    Terminal(#[from] std::io::Error),
}

/// Picks devices on behalf of the user.
///
/// Implementations own the terminal for as long as a call is running and
/// must return promptly once `cancel` fires.
#[async_trait]
pub trait DevicePicker: Send + Sync {
    async fn pick_one(
        &self,
        title: &str,
        devices: Vec<Device>,
        cancel: &CancellationToken,
    ) -> Result<Device, PickError>;

    async fn pick_many(
        &self,
        title: &str,
        devices: Vec<Device>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Device>, PickError>;

    /// Opens immediately and replaces its list with every snapshot received
    /// on `updates`. A closed channel only means no further updates.
    async fn pick_from_stream(
        &self,
        title: &str,
        updates: mpsc::Receiver<Vec<Device>>,
        cancel: &CancellationToken,
    ) -> Result<Device, PickError>;
}

/// Holds `gate` for the whole of every call on the wrapped picker, so
/// progress lines and log output stay off the screen the picker draws on.
pub struct GatedPicker {
    inner: Arc<dyn DevicePicker>,
    gate: TerminalGate,
}

impl GatedPicker {
    pub fn new(inner: Arc<dyn DevicePicker>, gate: TerminalGate) -> Self {
        Self { inner, gate }
    }
}

#[async_trait]
impl DevicePicker for GatedPicker {
    async fn pick_one(
        &self,
        title: &str,
        devices: Vec<Device>,
        cancel: &CancellationToken,
    ) -> Result<Device, PickError> {
        let _hold = self.gate.hold();
        self.inner.pick_one(title, devices, cancel).await
    }

    async fn pick_many(
        &self,
        title: &str,
        devices: Vec<Device>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Device>, PickError> {
        let _hold = self.gate.hold();
        self.inner.pick_many(title, devices, cancel).await
    }

    async fn pick_from_stream(
        &self,
        title: &str,
        updates: mpsc::Receiver<Vec<Device>>,
        cancel: &CancellationToken,
    ) -> Result<Device, PickError> {
        let _hold = self.gate.hold();
        self.inner.pick_from_stream(title, updates, cancel).await
    }
}
