/*!
 * Paired device listing
 */

use std::cmp::Ordering;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::bluetooth::BluetoothPort;
use crate::device::Device;
use crate::error::{or_canceled, CoreError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListFilter {
    #[default]
    All,
    Connected,
    Disconnected,
}

impl ListFilter {
    fn keeps(self, device: &Device) -> bool {
        match self {
            ListFilter::All => true,
            ListFilter::Connected => device.connected,
            ListFilter::Disconnected => !device.connected,
        }
    }
}

pub struct Lister {
    bluetooth: Arc<dyn BluetoothPort>,
}

impl Lister {
    pub fn new(bluetooth: Arc<dyn BluetoothPort>) -> Self {
        Self { bluetooth }
    }

    /// Paired devices, most recently connected first.
    pub async fn list(&self, filter: ListFilter, cancel: &CancellationToken) -> Result<Vec<Device>> {
        let mut devices = or_canceled(cancel, async {
            self.bluetooth.list().await.map_err(CoreError::from)
        })
        .await?;
        devices.retain(|d| filter.keeps(d));
        devices.sort_by(recent_first);
        Ok(devices)
    }
}

/// Devices without a timestamp go last, ordered by name.
fn recent_first(a: &Device, b: &Device) -> Ordering {
    match (&a.last_connected_at, &b.last_connected_at) {
        (Some(x), Some(y)) => y.cmp(x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.name.cmp(&b.name),
    }
}
