/*!
 * Device selection
 * Resolve a target from a name or a picker, then connect or disconnect it
 */

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::bluetooth::{BackendError, BluetoothPort};
use crate::device::Device;
use crate::error::{or_canceled, BatchFailure, CoreError, Result};
use crate::matcher::find_by_name;
use crate::picker::DevicePicker;

pub const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Connect,
    Disconnect,
}

impl Action {
    pub fn verb(self) -> &'static str {
        match self {
            Action::Connect => "connect",
            Action::Disconnect => "disconnect",
        }
    }

    /// Picker title. The terminal picker pre-filters on it.
    pub fn title(self) -> &'static str {
        match self {
            Action::Connect => "Connect",
            Action::Disconnect => "Disconnect",
        }
    }

    async fn run(self, bluetooth: &dyn BluetoothPort, address: &str) -> Result<(), BackendError> {
        match self {
            Action::Connect => bluetooth.connect(address).await,
            Action::Disconnect => bluetooth.disconnect(address).await,
        }
    }
}

/// One connect or disconnect request.
#[derive(Debug, Clone)]
pub struct SelectParams {
    /// Name or name prefix; empty means "let the user pick".
    pub name: String,
    pub exact: bool,
    pub interactive: bool,
    pub is_tty: bool,
    pub dry_run: bool,
    /// Bound on the backend call only, never on the time spent in the picker.
    pub action_timeout: Duration,
}

impl Default for SelectParams {
    fn default() -> Self {
        Self {
            name: String::new(),
            exact: false,
            interactive: false,
            is_tty: false,
            dry_run: false,
            action_timeout: DEFAULT_ACTION_TIMEOUT,
        }
    }
}

pub type ConnectParams = SelectParams;
pub type DisconnectParams = SelectParams;

/// A multi-select request.
#[derive(Debug, Clone)]
pub struct BatchParams {
    pub dry_run: bool,
    /// Applied to each device independently.
    pub action_timeout: Duration,
}

impl Default for BatchParams {
    fn default() -> Self {
        Self {
            dry_run: false,
            action_timeout: DEFAULT_ACTION_TIMEOUT,
        }
    }
}

/// Shared resolution logic behind `Connector` and `Disconnector`.
#[derive(Clone)]
pub struct Selector {
    bluetooth: Arc<dyn BluetoothPort>,
    picker: Option<Arc<dyn DevicePicker>>,
}

impl Selector {
    pub fn new(bluetooth: Arc<dyn BluetoothPort>, picker: Option<Arc<dyn DevicePicker>>) -> Self {
        Self { bluetooth, picker }
    }

    pub async fn resolve_and_act(
        &self,
        action: Action,
        params: &SelectParams,
        cancel: &CancellationToken,
    ) -> Result<Device> {
        let devices = or_canceled(cancel, async {
            self.bluetooth.list().await.map_err(CoreError::from)
        })
        .await?;
        let selected = self.resolve(action, devices, params, cancel).await?;

        if params.dry_run {
            debug!(address = %selected.address, "dry run, skipping {}", action.verb());
            return Ok(selected);
        }

        or_canceled(
            cancel,
            perform(&*self.bluetooth, action, &selected, params.action_timeout),
        )
        .await?;
        Ok(selected)
    }

    async fn resolve(
        &self,
        action: Action,
        devices: Vec<Device>,
        params: &SelectParams,
        cancel: &CancellationToken,
    ) -> Result<Device> {
        let query = params.name.trim();

        if query.is_empty() {
            let picker = match &self.picker {
                Some(picker) if params.interactive && params.is_tty => picker,
                _ => return Err(CoreError::not_found("")),
            };
            return Ok(picker.pick_one(action.title(), devices, cancel).await?);
        }

        let mut matches = find_by_name(&devices, query, params.exact);
        debug!(query, matches = matches.len(), "resolved name");

        match matches.len() {
            0 => Err(CoreError::not_found(query)),
            1 if params.interactive => {
                // Explicit --interactive still asks the user to confirm a lone match.
                if !params.is_tty {
                    return Err(CoreError::precondition("interactive mode requires a TTY"));
                }
                let Some(picker) = &self.picker else {
                    return Err(CoreError::not_found(query));
                };
                Ok(picker.pick_one(action.title(), matches, cancel).await?)
            }
            1 => Ok(matches.remove(0)),
            count => match &self.picker {
                Some(picker) if params.is_tty => {
                    Ok(picker.pick_one(action.title(), matches, cancel).await?)
                }
                _ => Err(CoreError::Ambiguous {
                    query: query.to_string(),
                    count,
                }),
            },
        }
    }

    /// Multi-select, then act on every selected device concurrently.
    ///
    /// One device failing never stops the others. When anything failed the
    /// error still carries the whole selection.
    pub async fn act_on_many(
        &self,
        action: Action,
        params: &BatchParams,
        cancel: &CancellationToken,
    ) -> Result<Vec<Device>> {
        let Some(picker) = &self.picker else {
            return Err(CoreError::not_found(""));
        };

        let devices = or_canceled(cancel, async {
            self.bluetooth.list().await.map_err(CoreError::from)
        })
        .await?;
        let selected = picker.pick_many(action.title(), devices, cancel).await?;
        if params.dry_run || selected.is_empty() {
            return Ok(selected);
        }

        let outcomes: Arc<Mutex<Vec<(Device, Result<()>)>>> =
            Arc::new(Mutex::new(Vec::with_capacity(selected.len())));
        let mut tasks = JoinSet::new();

        for device in selected.iter().cloned() {
            let bluetooth = Arc::clone(&self.bluetooth);
            let outcomes = Arc::clone(&outcomes);
            let timeout = params.action_timeout;
            tasks.spawn(async move {
                let outcome = perform(&*bluetooth, action, &device, timeout).await;
                if outcome.is_ok() {
                    info!("{} ok: {} ({})", action.verb(), device.name, device.address);
                }
                outcomes.lock().await.push((device, outcome));
            });
        }

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tasks.abort_all();
                    return Err(CoreError::Canceled);
                }
                joined = tasks.join_next() => match joined {
                    None => break,
                    Some(Err(err)) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
                    Some(_) => {}
                },
            }
        }

        let mut failures: Vec<BatchFailure> = outcomes
            .lock()
            .await
            .drain(..)
            .filter_map(|(device, outcome)| outcome.err().map(|error| BatchFailure { device, error }))
            .collect();

        if failures.is_empty() {
            return Ok(selected);
        }

        // Report failures in selection order, not completion order.
        failures.sort_by_key(|f| {
            selected
                .iter()
                .position(|d| d.same_as(&f.device))
                .unwrap_or(usize::MAX)
        });
        Err(CoreError::Batch {
            action: action.verb(),
            selected,
            failures,
        })
    }
}

async fn perform(
    bluetooth: &dyn BluetoothPort,
    action: Action,
    device: &Device,
    timeout: Duration,
) -> Result<()> {
    debug!(address = %device.address, "{} starting", action.verb());
    match tokio::time::timeout(timeout, action.run(bluetooth, &device.address)).await {
        Ok(outcome) => Ok(outcome?),
        Err(_) => Err(CoreError::TimedOut {
            action: action.verb(),
            after: timeout,
        }),
    }
}

/// Resolves a device and connects it.
#[derive(Clone)]
pub struct Connector {
    selector: Selector,
}

impl Connector {
    pub fn new(bluetooth: Arc<dyn BluetoothPort>, picker: Option<Arc<dyn DevicePicker>>) -> Self {
        Self {
            selector: Selector::new(bluetooth, picker),
        }
    }

    pub async fn connect(&self, params: &ConnectParams, cancel: &CancellationToken) -> Result<Device> {
        self.selector
            .resolve_and_act(Action::Connect, params, cancel)
            .await
    }

    pub async fn connect_many(
        &self,
        params: &BatchParams,
        cancel: &CancellationToken,
    ) -> Result<Vec<Device>> {
        self.selector.act_on_many(Action::Connect, params, cancel).await
    }
}

/// Resolves a device and disconnects it.
#[derive(Clone)]
pub struct Disconnector {
    selector: Selector,
}

impl Disconnector {
    pub fn new(bluetooth: Arc<dyn BluetoothPort>, picker: Option<Arc<dyn DevicePicker>>) -> Self {
        Self {
            selector: Selector::new(bluetooth, picker),
        }
    }

    pub async fn disconnect(
        &self,
        params: &DisconnectParams,
        cancel: &CancellationToken,
    ) -> Result<Device> {
        self.selector
            .resolve_and_act(Action::Disconnect, params, cancel)
            .await
    }

    pub async fn disconnect_many(
        &self,
        params: &BatchParams,
        cancel: &CancellationToken,
    ) -> Result<Vec<Device>> {
        self.selector
            .act_on_many(Action::Disconnect, params, cancel)
            .await
    }
}
