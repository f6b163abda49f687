/*!
 * Pairing workflows
 * pair:   discover -> pick -> pair -> connect (retry/verify)
 * repair: pick paired -> unpair -> discover -> pick -> pair -> connect
 */

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::bluetooth::BluetoothPort;
use crate::device::Device;
use crate::discovery::pick_by_discovery;
use crate::error::{or_canceled, CoreError, Result};
use crate::picker::DevicePicker;
use crate::progress::Progress;
use crate::retry::connect_with_retry_verify;

#[derive(Debug, Clone, Default)]
pub struct PairParams {
    pub interactive: bool,
    pub is_tty: bool,
    /// Total discovery window; 0 means the default.
    pub inquiry_secs: u64,
    pub pin: Option<String>,
    /// Total time to wait for the link across all attempts; 0 disables waiting.
    pub wait_connect_secs: u64,
    /// 0 means the default.
    pub max_attempts: u32,
}

#[derive(Debug, Clone, Default)]
pub struct RepairParams {
    pub interactive: bool,
    pub is_tty: bool,
    pub inquiry_secs: u64,
    pub pin: Option<String>,
    pub skip_unpair: bool,
    pub wait_connect_secs: u64,
    pub max_attempts: u32,
}

impl RepairParams {
    fn pairing(&self) -> PairParams {
        PairParams {
            interactive: self.interactive,
            is_tty: self.is_tty,
            inquiry_secs: self.inquiry_secs,
            pin: self.pin.clone(),
            wait_connect_secs: self.wait_connect_secs,
            max_attempts: self.max_attempts,
        }
    }
}

/// Result of a successful repair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repaired {
    /// The paired device the user chose to replace.
    pub from: Device,
    /// The freshly paired and connected device.
    pub to: Device,
}

fn ensure_interactive(
    operation: &str,
    interactive: bool,
    is_tty: bool,
    picker: Option<&Arc<dyn DevicePicker>>,
) -> Result<Arc<dyn DevicePicker>> {
    if !interactive {
        return Err(CoreError::precondition(format!(
            "{operation} requires --interactive (TTY only)"
        )));
    }
    if !is_tty {
        return Err(CoreError::precondition(format!("{operation} requires a TTY")));
    }
    picker
        .cloned()
        .ok_or_else(|| CoreError::precondition(format!("{operation} requires a picker")))
}

/// Pairs a newly discovered device and brings the connection up.
#[derive(Clone)]
pub struct Pairer {
    bluetooth: Arc<dyn BluetoothPort>,
    picker: Option<Arc<dyn DevicePicker>>,
    progress: Progress,
}

impl Pairer {
    pub fn new(
        bluetooth: Arc<dyn BluetoothPort>,
        picker: Option<Arc<dyn DevicePicker>>,
        progress: Progress,
    ) -> Self {
        Self {
            bluetooth,
            picker,
            progress,
        }
    }

    /// For a device that is already unpaired but not yet connected again.
    pub async fn pair(&self, params: &PairParams, cancel: &CancellationToken) -> Result<Device> {
        let picker = ensure_interactive(
            "pair",
            params.interactive,
            params.is_tty,
            self.picker.as_ref(),
        )?;

        let picked = pick_by_discovery(
            Arc::clone(&self.bluetooth),
            &*picker,
            &self.progress,
            "Pair: select device",
            params.inquiry_secs,
            cancel,
        )
        .await?;

        self.pair_and_connect(picked, params, cancel).await
    }

    async fn pair_and_connect(
        &self,
        picked: Device,
        params: &PairParams,
        cancel: &CancellationToken,
    ) -> Result<Device> {
        if picked.address.trim().is_empty() {
            return Err(CoreError::EmptyAddress);
        }

        self.progress
            .line(format_args!("Pairing with {} ({})...", picked.name, picked.address));
        or_canceled(cancel, async {
            self.bluetooth
                .pair(&picked.address, params.pin.as_deref())
                .await
                .map_err(CoreError::from)
        })
        .await?;

        connect_with_retry_verify(
            &*self.bluetooth,
            &self.progress,
            &picked.address,
            params.wait_connect_secs,
            params.max_attempts,
            cancel,
        )
        .await?;

        info!(address = %picked.address, "paired and connected");
        Ok(picked)
    }
}

/// Replaces a broken pairing with a fresh one.
#[derive(Clone)]
pub struct Repairer {
    pairer: Pairer,
}

impl Repairer {
    pub fn new(
        bluetooth: Arc<dyn BluetoothPort>,
        picker: Option<Arc<dyn DevicePicker>>,
        progress: Progress,
    ) -> Self {
        Self {
            pairer: Pairer::new(bluetooth, picker, progress),
        }
    }

    /// Any failure after the paired device was chosen comes back as
    /// `CoreError::Repair`, which still names that device.
    pub async fn repair(&self, params: &RepairParams, cancel: &CancellationToken) -> Result<Repaired> {
        let picker = ensure_interactive(
            "repair",
            params.interactive,
            params.is_tty,
            self.pairer.picker.as_ref(),
        )?;
        let bluetooth = &self.pairer.bluetooth;

        let paired = or_canceled(cancel, async {
            bluetooth.list().await.map_err(CoreError::from)
        })
        .await?;
        if paired.is_empty() {
            return Err(CoreError::not_found(""));
        }

        let from = picker
            .pick_one("Repair: select paired device to remove", paired, cancel)
            .await?;

        match self.replace(&from, &*picker, params, cancel).await {
            Ok(to) => Ok(Repaired { from, to }),
            Err(err) => Err(CoreError::Repair {
                from,
                source: Box::new(err),
            }),
        }
    }

    async fn replace(
        &self,
        from: &Device,
        picker: &dyn DevicePicker,
        params: &RepairParams,
        cancel: &CancellationToken,
    ) -> Result<Device> {
        let bluetooth = &self.pairer.bluetooth;
        let progress = &self.pairer.progress;

        if params.skip_unpair {
            progress.line("Skipping unpair");
        } else {
            progress.line(format_args!("Unpairing {} ({})...", from.name, from.address));
            or_canceled(cancel, async {
                bluetooth.unpair(&from.address).await.map_err(CoreError::from)
            })
            .await?;
        }

        let picked = pick_by_discovery(
            Arc::clone(bluetooth),
            picker,
            progress,
            "Repair: select device to pair",
            params.inquiry_secs,
            cancel,
        )
        .await?;

        self.pairer
            .pair_and_connect(picked, &params.pairing(), cancel)
            .await
    }
}
