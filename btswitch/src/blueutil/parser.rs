/*!
 * blueutil JSON output
 */

use btswitch_core::{BackendError, Device};
use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct RawDevice {
    address: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    connected: bool,
    #[serde(default, rename = "recentAccessDate")]
    recent_access_date: Option<DateTime<Utc>>,
    #[serde(default, rename = "RSSI")]
    rssi: Option<i32>,
    #[serde(default, rename = "rawRSSI")]
    raw_rssi: Option<i32>,
}

pub fn parse_device_list(json: &[u8]) -> Result<Vec<Device>, BackendError> {
    let raw: Vec<RawDevice> =
        serde_json::from_slice(json).map_err(|e| BackendError::Parse(e.to_string()))?;

    Ok(raw
        .into_iter()
        .map(|d| Device {
            name: d.name.unwrap_or_default(),
            address: normalize_address(&d.address),
            device_type: String::new(),
            rssi: d.rssi.or(d.raw_rssi),
            connected: d.connected,
            last_connected_at: d.recent_access_date,
        })
        .collect())
}

/// blueutil prints `aa-bb-...`; we show `aa:bb:...`.
pub fn normalize_address(address: &str) -> String {
    address.replace('-', ":")
}

/// Back to the form blueutil prints.
pub fn denormalize_address(address: &str) -> String {
    address.replace(':', "-")
}
