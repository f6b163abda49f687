/*!
 * Bluetooth Device Control
 * Capability contract implemented by the CLI's backend (blueutil today)
 */

use async_trait::async_trait;
use thiserror::Error;

use crate::device::Device;

/// Failures reported by a device-control backend.
///
/// `DependencyMissing` is distinct from ordinary failures: the tool the
/// backend drives is not installed, so nothing it does can work.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("dependency missing: {0}")]
    DependencyMissing(String),

    #[error("{message}")]
    Failed { message: String },

    #[error("unexpected backend output: {0}")]
    Parse(String),
}

impl BackendError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

/// Device-control operations the core relies on.
///
/// Futures returned here must be safe to drop at any await point; that is
/// how the core cancels a call that outlived its deadline.
#[async_trait]
pub trait BluetoothPort: Send + Sync {
    /// Paired devices.
    async fn list(&self) -> Result<Vec<Device>, BackendError>;

    async fn connect(&self, address: &str) -> Result<(), BackendError>;

    async fn disconnect(&self, address: &str) -> Result<(), BackendError>;

    async fn pair(&self, address: &str, pin: Option<&str>) -> Result<(), BackendError>;

    /// Removes pairing information for a device.
    async fn unpair(&self, address: &str) -> Result<(), BackendError>;

    /// Classic inquiry scan for `duration_secs`.
    async fn inquiry(&self, duration_secs: u64) -> Result<Vec<Device>, BackendError>;

    /// Blocks until the device reports connected or `timeout_secs` elapses.
    async fn wait_connect(&self, address: &str, timeout_secs: u64) -> Result<(), BackendError>;

    async fn is_connected(&self, address: &str) -> Result<bool, BackendError>;

    async fn connected_devices(&self) -> Result<Vec<Device>, BackendError>;
}
