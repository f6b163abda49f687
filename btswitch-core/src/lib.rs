/*!
 * btswitch core
 * Device resolution, discovery and pairing orchestration
 *
 * The core never touches a radio or a terminal itself. It talks to a
 * `BluetoothPort` for device control and a `DevicePicker` for interactive
 * selection, both supplied by the caller.
 */

mod bluetooth;
mod device;
mod discovery;
mod error;
mod list;
mod matcher;
mod pairing;
mod picker;
mod progress;
mod retry;
mod select;

#[cfg(test)]
pub(crate) mod testing;

pub use bluetooth::{BackendError, BluetoothPort};
pub use device::Device;
pub use discovery::{pick_by_discovery, DEFAULT_INQUIRY_SECS, INQUIRY_SLICE_SECS};
pub use error::{BatchFailure, CoreError, Result};
pub use list::{ListFilter, Lister};
pub use matcher::find_by_name;
pub use pairing::{PairParams, Pairer, RepairParams, Repaired, Repairer};
pub use picker::{DevicePicker, GatedPicker, PickError};
pub use progress::{GateHold, Progress, TerminalGate};
pub use retry::{connect_with_retry_verify, WaitBudget, DEFAULT_MAX_ATTEMPTS, WAIT_CHUNK_SECS};
pub use select::{
    Action, BatchParams, ConnectParams, Connector, DisconnectParams, Disconnector, SelectParams,
    Selector, DEFAULT_ACTION_TIMEOUT,
};
