use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace, warn};

use crate::client::TclClient;
use crate::mapper::{self, MAX_TARGET_C, MIN_TARGET_C, TARGET_STEP_C};
use crate::shadow::ShadowDocument;
use crate::types::{
    ClimateState, Command, DevicePhase, Event, FanSpeed, FreshAirMode, HvacMode, SwingMode,
};
use crate::{Error, Result, diff};

/// Matches the vendor app's refresh cadence. Failed cycles wait for the
/// next tick; the interval is the only backoff.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(180);

type EventCallback = Box<dyn Fn(&Event) + Send + Sync>;
type StateCallback = Box<dyn Fn(&str, &ClimateState) + Send + Sync>;

pub struct AcMonitorBuilder {
    client: TclClient,
    interval: Duration,
    device_ids: Vec<String>,
    event_callbacks: Vec<EventCallback>,
    state_callbacks: Vec<StateCallback>,
}

impl AcMonitorBuilder {
    pub fn new(client: TclClient) -> Self {
        Self {
            client,
            interval: DEFAULT_POLL_INTERVAL,
            device_ids: Vec::new(),
            event_callbacks: Vec::new(),
            state_callbacks: Vec::new(),
        }
    }

    pub fn device(mut self, device_id: impl Into<String>) -> Self {
        self.device_ids.push(device_id.into());
        self
    }

    pub fn devices<I, S>(mut self, device_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.device_ids.extend(device_ids.into_iter().map(Into::into));
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn on_event(mut self, f: impl Fn(&Event) + Send + Sync + 'static) -> Self {
        self.event_callbacks.push(Box::new(f));
        self
    }

    pub fn on_state(mut self, f: impl Fn(&str, &ClimateState) + Send + Sync + 'static) -> Self {
        self.state_callbacks.push(Box::new(f));
        self
    }

    pub fn build(self) -> AcMonitor {
        let devices = self
            .device_ids
            .into_iter()
            .map(|id| (id, DeviceSlot::default()))
            .collect();

        AcMonitor {
            inner: Arc::new(MonitorInner {
                client: self.client,
                interval: self.interval,
                devices,
                event_callbacks: self.event_callbacks,
                state_callbacks: self.state_callbacks,
            }),
            tasks: Mutex::new(Vec::new()),
        }
    }
}

/// Supervises one poll loop per device and serializes desired-state writes.
/// Commands run concurrently with polls; a per-device lock guarantees a
/// command patch is never applied against a document that predates another
/// command's already-merged change.
pub struct AcMonitor {
    inner: Arc<MonitorInner>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

struct MonitorInner {
    client: TclClient,
    interval: Duration,
    devices: HashMap<String, DeviceSlot>,
    event_callbacks: Vec<EventCallback>,
    state_callbacks: Vec<StateCallback>,
}

#[derive(Default)]
struct DeviceSlot {
    write_lock: tokio::sync::Mutex<()>,
    snapshot: Mutex<Snapshot>,
}

struct Snapshot {
    phase: DevicePhase,
    available: bool,
    version: u64,
    attributes: Map<String, Value>,
    climate: ClimateState,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            phase: DevicePhase::Uninitialized,
            available: false,
            version: 0,
            attributes: Map::new(),
            climate: ClimateState::default(),
        }
    }
}

impl AcMonitor {
    pub fn builder(client: TclClient) -> AcMonitorBuilder {
        AcMonitorBuilder::new(client)
    }

    /// Spawn one fixed-interval poll task per device. Requires a tokio
    /// runtime. Calling again while running is a no-op.
    pub fn start(&self) {
        let mut tasks = self.tasks.lock().expect("tasks mutex poisoned");
        if !tasks.is_empty() {
            debug!("monitor already started");
            return;
        }
        for device_id in self.inner.devices.keys().cloned() {
            let inner = Arc::clone(&self.inner);
            tasks.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(inner.interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    // Sequential awaits: a new poll cannot start before the
                    // previous one for this device finishes.
                    ticker.tick().await;
                    if let Err(e) = inner.poll_device(&device_id).await {
                        warn!(device = %device_id, error = %e, "poll failed, keeping last known state");
                    }
                }
            }));
        }
    }

    /// Abort the poll tasks. Calling again, or before `start`, is a no-op.
    pub fn stop(&self) {
        let mut tasks = self.tasks.lock().expect("tasks mutex poisoned");
        for task in tasks.drain(..) {
            task.abort();
        }
    }

    /// On-demand poll hook for a host scheduler.
    pub async fn poll_now(&self, device_id: &str) -> Result<ClimateState> {
        self.inner.poll_device(device_id).await
    }

    pub fn device_ids(&self) -> Vec<String> {
        self.inner.devices.keys().cloned().collect()
    }

    pub fn state(&self, device_id: &str) -> Option<ClimateState> {
        self.inner
            .devices
            .get(device_id)
            .map(|slot| slot.locked().climate.clone())
    }

    pub fn available(&self, device_id: &str) -> Option<bool> {
        self.inner.devices.get(device_id).map(|slot| slot.locked().available)
    }

    pub fn phase(&self, device_id: &str) -> Option<DevicePhase> {
        self.inner.devices.get(device_id).map(|slot| slot.locked().phase)
    }

    pub async fn set_power(&self, device_id: &str, on: bool) -> Result<ClimateState> {
        self.command(device_id, Command::Power(on)).await
    }

    pub async fn set_mode(&self, device_id: &str, mode: HvacMode) -> Result<ClimateState> {
        if mode == HvacMode::Unknown {
            return Err(Error::InvalidMode("cannot command the unknown work mode".to_string()));
        }
        self.command(device_id, Command::Mode(mode)).await
    }

    pub async fn set_target_temperature(
        &self,
        device_id: &str,
        celsius: f64,
    ) -> Result<ClimateState> {
        if !(MIN_TARGET_C..=MAX_TARGET_C).contains(&celsius) {
            return Err(Error::InvalidTemperature {
                requested: celsius,
                min: MIN_TARGET_C,
                max: MAX_TARGET_C,
            });
        }
        let steps = (celsius - MIN_TARGET_C) / TARGET_STEP_C;
        if (steps - steps.round()).abs() > 1e-9 {
            return Err(Error::InvalidTemperature {
                requested: celsius,
                min: MIN_TARGET_C,
                max: MAX_TARGET_C,
            });
        }
        self.command(device_id, Command::TargetTemperature(celsius)).await
    }

    pub async fn set_fan_speed(&self, device_id: &str, speed: FanSpeed) -> Result<ClimateState> {
        if speed == FanSpeed::Unknown {
            return Err(Error::InvalidMode("cannot command the unknown fan speed".to_string()));
        }
        self.command(device_id, Command::FanSpeed(speed)).await
    }

    pub async fn set_swing(&self, device_id: &str, swing: SwingMode) -> Result<ClimateState> {
        self.command(device_id, Command::Swing(swing)).await
    }

    pub async fn set_eco(&self, device_id: &str, on: bool) -> Result<ClimateState> {
        self.command(device_id, Command::Eco(on)).await
    }

    pub async fn set_sleep(&self, device_id: &str, on: bool) -> Result<ClimateState> {
        self.command(device_id, Command::Sleep(on)).await
    }

    pub async fn set_self_clean(&self, device_id: &str, on: bool) -> Result<ClimateState> {
        self.command(device_id, Command::SelfClean(on)).await
    }

    pub async fn set_display(&self, device_id: &str, on: bool) -> Result<ClimateState> {
        self.command(device_id, Command::Display(on)).await
    }

    pub async fn set_fresh_air(
        &self,
        device_id: &str,
        power: Option<bool>,
        mode: Option<FreshAirMode>,
        strength: Option<u8>,
        auto_strength: Option<bool>,
    ) -> Result<ClimateState> {
        self.command(device_id, Command::FreshAir { power, mode, strength, auto_strength })
            .await
    }

    /// Send one command. The returned state already includes the service's
    /// merged document, so callers see their write without waiting for the
    /// next poll.
    pub async fn command(&self, device_id: &str, command: Command) -> Result<ClimateState> {
        let slot = self.inner.slot(device_id)?;
        let _guard = slot.write_lock.lock().await;

        let patch = mapper::to_patch(&command);
        if patch.is_empty() {
            debug!(device = device_id, ?command, "command implies no fields, nothing to send");
            return Ok(slot.locked().climate.clone());
        }

        let doc = self.inner.update_with_retry(device_id, patch).await?;
        Ok(self.inner.apply_document(device_id, slot, &doc, true))
    }
}

impl Drop for AcMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

impl DeviceSlot {
    fn locked(&self) -> std::sync::MutexGuard<'_, Snapshot> {
        self.snapshot.lock().expect("snapshot mutex poisoned")
    }
}

impl MonitorInner {
    fn slot(&self, device_id: &str) -> Result<&DeviceSlot> {
        self.devices
            .get(device_id)
            .ok_or_else(|| Error::UnknownDevice(device_id.to_string()))
    }

    async fn poll_device(&self, device_id: &str) -> Result<ClimateState> {
        let slot = self.slot(device_id)?;
        match self.fetch_with_retry(device_id).await {
            Ok(doc) => Ok(self.apply_document(device_id, slot, &doc, false)),
            Err(e) => {
                self.mark_degraded(device_id, slot);
                Err(e)
            }
        }
    }

    /// One fetch, plus exactly one refresh-and-retry when the IoT endpoint
    /// rejects the credentials. A second rejection propagates.
    async fn fetch_with_retry(&self, device_id: &str) -> Result<ShadowDocument> {
        match self.client.get_shadow(device_id).await {
            Err(e) if e.is_auth_expired() => {
                debug!(device = device_id, "credentials rejected, refreshing and retrying once");
                self.client.refresh_credentials().await?;
                self.client.get_shadow(device_id).await
            }
            other => other,
        }
    }

    async fn update_with_retry(
        &self,
        device_id: &str,
        patch: Map<String, Value>,
    ) -> Result<ShadowDocument> {
        match self.client.update_shadow(device_id, patch.clone()).await {
            Err(e) if e.is_auth_expired() => {
                debug!(device = device_id, "credentials rejected, refreshing and retrying once");
                self.client.refresh_credentials().await?;
                self.client.update_shadow(device_id, patch).await
            }
            other => other,
        }
    }

    /// Fold a fetched or echoed document into the device snapshot and
    /// notify callbacks. Documents older than the last applied version are
    /// discarded so a stale concurrent read never overwrites newer state.
    fn apply_document(
        &self,
        device_id: &str,
        slot: &DeviceSlot,
        doc: &ShadowDocument,
        prefer_desired: bool,
    ) -> ClimateState {
        let attributes = if prefer_desired {
            doc.merged()
        } else {
            doc.reported().clone()
        };

        let mut events;
        let state;
        {
            let mut snap = slot.locked();
            if doc.version > 0 && doc.version < snap.version {
                trace!(
                    device = device_id,
                    incoming = doc.version,
                    current = snap.version,
                    "discarding stale shadow document"
                );
                return snap.climate.clone();
            }

            let mut changes = Vec::new();
            diff::diff_values(
                &Value::Object(snap.attributes.clone()),
                &Value::Object(attributes.clone()),
                "",
                &mut changes,
            );
            events = diff::map_events(device_id, &changes, &attributes);
            if !snap.available {
                events.push(Event::AvailabilityChanged {
                    device_id: device_id.to_string(),
                    available: true,
                });
            }

            snap.climate = mapper::to_climate_state(&attributes);
            snap.attributes = attributes;
            snap.version = snap.version.max(doc.version);
            snap.phase = DevicePhase::Polling;
            snap.available = true;
            state = snap.climate.clone();
        }

        self.fire_events(&events);
        for cb in &self.state_callbacks {
            cb(device_id, &state);
        }
        state
    }

    fn mark_degraded(&self, device_id: &str, slot: &DeviceSlot) {
        let mut events = Vec::new();
        {
            let mut snap = slot.locked();
            if snap.available {
                events.push(Event::AvailabilityChanged {
                    device_id: device_id.to_string(),
                    available: false,
                });
            }
            snap.available = false;
            snap.phase = DevicePhase::Degraded;
        }
        self.fire_events(&events);
    }

    fn fire_events(&self, events: &[Event]) {
        for event in events {
            for cb in &self.event_callbacks {
                cb(event);
            }
        }
    }
}
