/*!
 * Device snapshots
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A point-in-time view of one Bluetooth device.
///
/// Snapshots are never updated in place: every list or inquiry call hands
/// out fresh values. The address is the identity; names may collide.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub name: String,
    pub address: String,
    #[serde(rename = "type")]
    pub device_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rssi: Option<i32>,
    pub connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_connected_at: Option<DateTime<Utc>>,
}

impl Device {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            ..Default::default()
        }
    }

    /// Same physical device, regardless of what else differs between snapshots.
    pub fn same_as(&self, other: &Device) -> bool {
        self.address == other.address
    }

    /// Both a name and an address are present. Discovery drops anything else.
    pub fn is_addressable(&self) -> bool {
        !self.name.trim().is_empty() && !self.address.trim().is_empty()
    }
}
