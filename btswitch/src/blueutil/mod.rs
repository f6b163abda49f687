/*!
 * blueutil backend
 * Device control by shelling out to blueutil (macOS)
 */

mod exec;
mod parser;

use std::io::ErrorKind;
use std::sync::Arc;

use async_trait::async_trait;
use btswitch_core::{BackendError, BluetoothPort, Device};
use tokio::time::Instant;
use tracing::debug;

use exec::{CommandRunner, TokioRunner};
use parser::{denormalize_address, parse_device_list};

/// Inquiry length used when the caller asks for 0 seconds.
const DEFAULT_INQUIRY_SECS: u64 = 10;

pub struct BlueutilClient {
    bin: String,
    runner: Arc<dyn CommandRunner>,
    check_path: bool,
}

impl BlueutilClient {
    pub fn new(bin: impl Into<String>) -> Self {
        Self {
            bin: bin.into(),
            runner: Arc::new(TokioRunner),
            check_path: true,
        }
    }

    /// Uses `runner` and skips the `PATH` lookup.
    pub fn with_runner(bin: impl Into<String>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            bin: bin.into(),
            runner,
            check_path: false,
        }
    }

    async fn run(&self, args: &[String]) -> Result<Vec<u8>, BackendError> {
        if self.check_path && which::which(&self.bin).is_err() {
            return Err(BackendError::DependencyMissing(self.bin.clone()));
        }

        let started = Instant::now();
        debug!(bin = %self.bin, args = ?args, "blueutil start");
        let output = self.runner.run(&self.bin, args).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                BackendError::DependencyMissing(self.bin.clone())
            } else {
                BackendError::failed(format!("{}: {e}", self.bin))
            }
        })?;
        debug!(
            bin = %self.bin,
            args = ?args,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "blueutil done"
        );

        if !output.success {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            let message = if stderr.is_empty() {
                format!("{}: {}", self.bin, output.status)
            } else {
                format!("{}: {}: {stderr}", self.bin, output.status)
            };
            return Err(BackendError::failed(message));
        }
        Ok(output.stdout)
    }

    async fn run_on(&self, flag: &str, address: &str, extra: Option<String>) -> Result<Vec<u8>, BackendError> {
        let mut args = vec![flag.to_string(), denormalize_address(address)];
        args.extend(extra);
        self.run(&args).await
    }
}

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|a| a.to_string()).collect()
}

#[async_trait]
impl BluetoothPort for BlueutilClient {
    async fn list(&self) -> Result<Vec<Device>, BackendError> {
        let stdout = self.run(&args(&["--paired", "--format", "json"])).await?;
        parse_device_list(&stdout)
    }

    async fn connect(&self, address: &str) -> Result<(), BackendError> {
        self.run_on("--connect", address, None).await.map(drop)
    }

    async fn disconnect(&self, address: &str) -> Result<(), BackendError> {
        self.run_on("--disconnect", address, None).await.map(drop)
    }

    async fn pair(&self, address: &str, pin: Option<&str>) -> Result<(), BackendError> {
        let pin = pin.filter(|p| !p.is_empty()).map(str::to_string);
        self.run_on("--pair", address, pin).await.map(drop)
    }

    async fn unpair(&self, address: &str) -> Result<(), BackendError> {
        self.run_on("--unpair", address, None).await.map(drop)
    }

    async fn inquiry(&self, duration_secs: u64) -> Result<Vec<Device>, BackendError> {
        let secs = if duration_secs == 0 {
            DEFAULT_INQUIRY_SECS
        } else {
            duration_secs
        };
        let stdout = self
            .run(&args(&["--inquiry", &secs.to_string(), "--format", "json"]))
            .await?;
        parse_device_list(&stdout)
    }

    async fn wait_connect(&self, address: &str, timeout_secs: u64) -> Result<(), BackendError> {
        let timeout = (timeout_secs > 0).then(|| timeout_secs.to_string());
        self.run_on("--wait-connect", address, timeout).await.map(drop)
    }

    async fn is_connected(&self, address: &str) -> Result<bool, BackendError> {
        let stdout = self.run_on("--is-connected", address, None).await?;
        Ok(String::from_utf8_lossy(&stdout).trim() == "1")
    }

    async fn connected_devices(&self) -> Result<Vec<Device>, BackendError> {
        let stdout = self.run(&args(&["--connected", "--format", "json"])).await?;
        parse_device_list(&stdout)
    }
}
