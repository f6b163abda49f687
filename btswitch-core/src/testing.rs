//! In-memory collaborators for unit tests.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::bluetooth::{BackendError, BluetoothPort};
use crate::device::Device;
use crate::picker::{DevicePicker, PickError};

#[derive(Default)]
pub struct FakeState {
    pub devices: Vec<Device>,
    pub inquiry_script: VecDeque<Result<Vec<Device>, String>>,
    pub is_connected: bool,

    pub list_err: Option<String>,
    pub connect_err: Option<String>,
    pub fail_connect_for: HashSet<String>,
    pub disconnect_err: Option<String>,
    pub pair_err: Option<String>,
    pub unpair_err: Option<String>,
    pub wait_err: Option<String>,
    pub is_connected_err: Option<String>,
    pub dependency_missing: bool,

    /// Time each list call takes.
    pub list_delay: Duration,
    /// Time each connect call takes.
    pub connect_delay: Duration,
    /// When set, wait_connect sleeps for its full timeout.
    pub wait_sleeps: bool,

    pub connected: Vec<String>,
    pub disconnected: Vec<String>,
    pub paired: Vec<(String, Option<String>)>,
    pub unpaired: Vec<String>,
    pub waits: Vec<(String, u64)>,
    pub inquiries: usize,
    pub is_connected_calls: usize,
}

#[derive(Default)]
pub struct FakeBluetooth {
    pub state: Mutex<FakeState>,
}

impl FakeBluetooth {
    pub fn with_devices(devices: Vec<Device>) -> Self {
        let fake = Self::default();
        fake.state.lock().unwrap().devices = devices;
        fake
    }

    pub fn set(&self, f: impl FnOnce(&mut FakeState)) {
        f(&mut self.state.lock().unwrap());
    }

    pub fn get<T>(&self, f: impl FnOnce(&FakeState) -> T) -> T {
        f(&self.state.lock().unwrap())
    }

    fn check(&self, err: impl FnOnce(&FakeState) -> Option<String>) -> Result<(), BackendError> {
        let state = self.state.lock().unwrap();
        if state.dependency_missing {
            return Err(BackendError::DependencyMissing("blueutil".to_string()));
        }
        match err(&state) {
            Some(message) => Err(BackendError::failed(message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl BluetoothPort for FakeBluetooth {
    async fn list(&self) -> Result<Vec<Device>, BackendError> {
        let delay = self.get(|s| s.list_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.check(|s| s.list_err.clone())?;
        Ok(self.get(|s| s.devices.clone()))
    }

    async fn connect(&self, address: &str) -> Result<(), BackendError> {
        let delay = self.get(|s| s.connect_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.check(|s| {
            if s.fail_connect_for.contains(address) {
                Some(format!("cannot reach {address}"))
            } else {
                s.connect_err.clone()
            }
        })?;
        self.set(|s| s.connected.push(address.to_string()));
        Ok(())
    }

    async fn disconnect(&self, address: &str) -> Result<(), BackendError> {
        self.check(|s| s.disconnect_err.clone())?;
        self.set(|s| s.disconnected.push(address.to_string()));
        Ok(())
    }

    async fn pair(&self, address: &str, pin: Option<&str>) -> Result<(), BackendError> {
        self.check(|s| s.pair_err.clone())?;
        self.set(|s| s.paired.push((address.to_string(), pin.map(str::to_string))));
        Ok(())
    }

    async fn unpair(&self, address: &str) -> Result<(), BackendError> {
        self.check(|s| s.unpair_err.clone())?;
        self.set(|s| s.unpaired.push(address.to_string()));
        Ok(())
    }

    async fn inquiry(&self, duration_secs: u64) -> Result<Vec<Device>, BackendError> {
        tokio::time::sleep(Duration::from_secs(duration_secs)).await;
        self.check(|_| None)?;
        let next = {
            let mut state = self.state.lock().unwrap();
            state.inquiries += 1;
            state.inquiry_script.pop_front()
        };
        match next {
            Some(Ok(found)) => Ok(found),
            Some(Err(message)) => Err(BackendError::failed(message)),
            None => Ok(Vec::new()),
        }
    }

    async fn wait_connect(&self, address: &str, timeout_secs: u64) -> Result<(), BackendError> {
        self.set(|s| s.waits.push((address.to_string(), timeout_secs)));
        if self.get(|s| s.wait_sleeps) {
            tokio::time::sleep(Duration::from_secs(timeout_secs)).await;
        }
        self.check(|s| s.wait_err.clone())
    }

    async fn is_connected(&self, _address: &str) -> Result<bool, BackendError> {
        self.set(|s| s.is_connected_calls += 1);
        self.check(|s| s.is_connected_err.clone())?;
        Ok(self.get(|s| s.is_connected))
    }

    async fn connected_devices(&self) -> Result<Vec<Device>, BackendError> {
        self.check(|_| None)?;
        Ok(self.get(|s| s.devices.iter().filter(|d| d.connected).cloned().collect()))
    }
}

#[derive(Default)]
pub struct PickerState {
    pub calls: usize,
    pub titles: Vec<String>,
    pub shown: Vec<Vec<Device>>,
    pub streamed: Vec<Device>,
}

/// Returns `picked` (or the first shown device), or `Canceled` when `cancel` is set.
#[derive(Default)]
pub struct FakePicker {
    pub picked: Option<Device>,
    pub picked_many: Option<Vec<Device>>,
    pub cancel: bool,
    pub state: Mutex<PickerState>,
}

impl FakePicker {
    pub fn picking(device: Device) -> Self {
        Self {
            picked: Some(device),
            ..Default::default()
        }
    }

    pub fn canceling() -> Self {
        Self {
            cancel: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.state.lock().unwrap().calls
    }

    pub fn titles(&self) -> Vec<String> {
        self.state.lock().unwrap().titles.clone()
    }

    pub fn shown(&self) -> Vec<Vec<Device>> {
        self.state.lock().unwrap().shown.clone()
    }

    fn record(&self, title: &str, devices: &[Device]) {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        state.titles.push(title.to_string());
        state.shown.push(devices.to_vec());
    }
}

#[async_trait]
impl DevicePicker for FakePicker {
    async fn pick_one(
        &self,
        title: &str,
        devices: Vec<Device>,
        _cancel: &CancellationToken,
    ) -> Result<Device, PickError> {
        self.record(title, &devices);
        if self.cancel {
            return Err(PickError::Canceled);
        }
        self.picked
            .clone()
            .or_else(|| devices.first().cloned())
            .ok_or(PickError::Canceled)
    }

    async fn pick_many(
        &self,
        title: &str,
        devices: Vec<Device>,
        _cancel: &CancellationToken,
    ) -> Result<Vec<Device>, PickError> {
        self.record(title, &devices);
        if self.cancel {
            return Err(PickError::Canceled);
        }
        Ok(self.picked_many.clone().unwrap_or(devices))
    }

    async fn pick_from_stream(
        &self,
        title: &str,
        mut updates: mpsc::Receiver<Vec<Device>>,
        cancel: &CancellationToken,
    ) -> Result<Device, PickError> {
        let first = tokio::select! {
            _ = cancel.cancelled() => return Err(PickError::Canceled),
            snapshot = updates.recv() => snapshot.unwrap_or_default(),
        };
        self.record(title, &first);
        self.state.lock().unwrap().streamed = first.clone();
        if self.cancel {
            return Err(PickError::Canceled);
        }
        self.picked
            .clone()
            .or_else(|| first.first().cloned())
            .ok_or(PickError::Canceled)
    }
}
