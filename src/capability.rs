//! Operating-mode selection from hardware capability and thermal pressure.
//!
//! The monitor is the single writer of [`DeviceMode`]. Readers hold a cloned
//! [`ModeHandle`] and take one snapshot per frame.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use std::thread;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::CapabilityConfig;

/// Fusion fidelity the pipeline runs at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceMode {
    /// Depth-sensor fusion with 3D pose detection.
    Pro,
    /// Estimated constant depth. Always available.
    Standard,
}

impl DeviceMode {
    pub fn description(&self) -> &'static str {
        match self {
            DeviceMode::Pro => "Pro (depth fusion + 3D pose)",
            DeviceMode::Standard => "Standard (estimated depth)",
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            DeviceMode::Pro => 0,
            DeviceMode::Standard => 1,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => DeviceMode::Pro,
            _ => DeviceMode::Standard,
        }
    }
}

impl fmt::Display for DeviceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceMode::Pro => write!(f, "pro"),
            DeviceMode::Standard => write!(f, "standard"),
        }
    }
}

/// Platform thermal pressure, ordered from coolest to hottest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ThermalState {
    Nominal,
    Fair,
    Serious,
    Critical,
}

impl ThermalState {
    /// Serious or Critical.
    pub fn is_throttling(&self) -> bool {
        *self >= ThermalState::Serious
    }
}

/// Hardware capability inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Capabilities {
    pub has_depth_sensor: bool,
    pub supports_3d_pose: bool,
}

impl Capabilities {
    pub fn new(has_depth_sensor: bool, supports_3d_pose: bool) -> Self {
        Self {
            has_depth_sensor,
            supports_3d_pose,
        }
    }

    pub fn from_config(config: &CapabilityConfig) -> Self {
        Self::new(config.has_depth_sensor, config.supports_3d_pose)
    }

    pub fn can_run_pro(&self) -> bool {
        self.has_depth_sensor && self.supports_3d_pose
    }

    pub fn initial_mode(&self) -> DeviceMode {
        if self.can_run_pro() {
            DeviceMode::Pro
        } else {
            DeviceMode::Standard
        }
    }
}

/// Shared, lock-free view of the active mode.
#[derive(Debug, Clone)]
pub struct ModeHandle {
    mode: Arc<AtomicU8>,
}

impl ModeHandle {
    pub fn new(mode: DeviceMode) -> Self {
        Self {
            mode: Arc::new(AtomicU8::new(mode.to_u8())),
        }
    }

    pub fn current(&self) -> DeviceMode {
        DeviceMode::from_u8(self.mode.load(Ordering::Acquire))
    }

    fn store(&self, mode: DeviceMode) {
        self.mode.store(mode.to_u8(), Ordering::Release);
    }
}

/// Events published by the monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MonitorEvent {
    /// Thermal pressure forced Pro down to Standard. Sent once per downgrade.
    ThermalDowngrade { thermal: ThermalState },
    /// Thermal pressure eased and Pro was restored.
    Restored { thermal: ThermalState },
    /// Depth output could not be provided; Standard from now on.
    DepthUnavailable,
}

impl MonitorEvent {
    pub fn mode(&self) -> DeviceMode {
        match self {
            MonitorEvent::Restored { .. } => DeviceMode::Pro,
            MonitorEvent::ThermalDowngrade { .. } | MonitorEvent::DepthUnavailable => {
                DeviceMode::Standard
            }
        }
    }

    pub fn is_thermal_warning(&self) -> bool {
        matches!(self, MonitorEvent::ThermalDowngrade { .. })
    }
}

pub struct CapabilityMonitor {
    capabilities: Capabilities,
    hardware_pro: bool,
    downgraded: bool,
    thermal: ThermalState,
    mode: ModeHandle,
    events: Option<Sender<MonitorEvent>>,
}

impl CapabilityMonitor {
    pub fn new(capabilities: Capabilities) -> Self {
        let mode = capabilities.initial_mode();
        info!(
            mode = %mode,
            depth_sensor = capabilities.has_depth_sensor,
            pose_3d = capabilities.supports_3d_pose,
            "capability detected: {}",
            mode.description()
        );
        Self {
            capabilities,
            hardware_pro: capabilities.can_run_pro(),
            downgraded: false,
            thermal: ThermalState::Nominal,
            mode: ModeHandle::new(mode),
            events: None,
        }
    }

    /// Publish transitions on `tx` as well as returning them.
    pub fn with_events(mut self, tx: Sender<MonitorEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Reader handle for fusion and the pipeline.
    pub fn handle(&self) -> ModeHandle {
        self.mode.clone()
    }

    pub fn mode(&self) -> DeviceMode {
        self.mode.current()
    }

    pub fn is_downgraded(&self) -> bool {
        self.downgraded
    }

    pub fn thermal(&self) -> ThermalState {
        self.thermal
    }

    /// Apply a thermal update. Returns the transition it caused, if any.
    pub fn on_thermal(&mut self, thermal: ThermalState) -> Option<MonitorEvent> {
        let previous = self.thermal;
        self.thermal = thermal;
        debug!(?previous, ?thermal, "thermal state update");

        let current = self.mode.current();
        let event = if thermal.is_throttling() && current == DeviceMode::Pro && !self.downgraded {
            self.mode.store(DeviceMode::Standard);
            self.downgraded = true;
            warn!(?thermal, "thermal pressure: falling back to standard mode");
            Some(MonitorEvent::ThermalDowngrade { thermal })
        } else if !thermal.is_throttling() && self.downgraded && self.hardware_pro {
            self.mode.store(DeviceMode::Pro);
            self.downgraded = false;
            info!(?thermal, "thermal pressure eased: pro mode restored");
            Some(MonitorEvent::Restored { thermal })
        } else {
            None
        };

        if let Some(ref ev) = event {
            self.publish(ev.clone());
        }
        event
    }

    /// Depth output could not be allocated or no depth device was found.
    pub fn report_depth_unavailable(&mut self) -> Option<MonitorEvent> {
        if !self.hardware_pro {
            return None;
        }
        self.hardware_pro = false;
        self.downgraded = false;
        let was = self.mode.current();
        self.mode.store(DeviceMode::Standard);
        warn!(previous = %was, "depth output unavailable: standard mode for the rest of the session");
        let event = MonitorEvent::DepthUnavailable;
        self.publish(event.clone());
        Some(event)
    }

    fn publish(&self, event: MonitorEvent) {
        if let Some(ref tx) = self.events {
            // 受信側が先に終了していても監視は続ける
            let _ = tx.send(event);
        }
    }

    /// Consume thermal updates until the sender side hangs up.
    pub fn run(mut self, thermal_rx: Receiver<ThermalState>) -> Self {
        for thermal in thermal_rx.iter() {
            self.on_thermal(thermal);
        }
        debug!("thermal channel closed");
        // イベント受信側のループを終わらせる
        self.events = None;
        self
    }

    /// Run the monitor on its own thread. The returned handle stays valid
    /// for readers after the thread exits.
    pub fn spawn(self, thermal_rx: Receiver<ThermalState>) -> (ModeHandle, thread::JoinHandle<Self>) {
        let handle = self.handle();
        let join = thread::spawn(move || self.run(thermal_rx));
        (handle, join)
    }
}
