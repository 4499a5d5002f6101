//! Result record (component K): an append-only ordered list of
//! per-device outcomes, the sole input to the external reporting
//! collaborator (spec §6).

use std::net::Ipv4Addr;

use camprov_common::HardwareAddress;

/// The outcome of a single provisioning step.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub success: bool,
    pub message: String,
}

/// `pending | in_progress | success | failed_<stage>`, per spec §3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceStatus {
    Pending,
    InProgress,
    Success,
    Failed(String),
}

impl DeviceStatus {
    /// The report-facing string, e.g. `failed_ip-configuration`.
    pub fn label(&self) -> String {
        match self {
            DeviceStatus::Pending => "pending".to_string(),
            DeviceStatus::InProgress => "in_progress".to_string(),
            DeviceStatus::Success => "success".to_string(),
            DeviceStatus::Failed(stage) => format!("failed_{stage}"),
        }
    }
}

/// One device's full provisioning history. `steps` preserves execution
/// order; `status` is the overall verdict described in spec §4.J.
#[derive(Debug, Clone)]
pub struct DeviceRecord {
    pub temp_addr: Ipv4Addr,
    pub hw: HardwareAddress,
    pub final_addr: Option<Ipv4Addr>,
    pub verified_hw: Option<HardwareAddress>,
    pub serial: Option<String>,
    pub status: DeviceStatus,
    pub steps: Vec<(String, StepOutcome)>,
}

impl DeviceRecord {
    pub fn new(temp_addr: Ipv4Addr, hw: HardwareAddress) -> Self {
        Self {
            temp_addr,
            hw,
            final_addr: None,
            verified_hw: None,
            serial: None,
            status: DeviceStatus::Pending,
            steps: Vec::new(),
        }
    }

    /// Append a step outcome, preserving the order it executed in.
    pub fn record_step(&mut self, name: impl Into<String>, success: bool, message: impl Into<String>) {
        self.steps.push((
            name.into(),
            StepOutcome {
                success,
                message: message.into(),
            },
        ));
    }

    pub fn abort(&mut self, stage: impl Into<String>) {
        self.status = DeviceStatus::Failed(stage.into());
    }

    pub fn succeed(&mut self) {
        self.status = DeviceStatus::Success;
    }
}

/// An append-only ordered list of [`DeviceRecord`]. Written only by the
/// orchestrator task; readable by any caller after the run completes.
#[derive(Debug, Clone, Default)]
pub struct ResultRecord {
    devices: Vec<DeviceRecord>,
}

impl ResultRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: DeviceRecord) {
        self.devices.push(record);
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.devices.iter()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// The run outcome described in spec §6: zero (true) when every
    /// device reached `success`, non-zero (false) otherwise.
    pub fn all_succeeded(&self) -> bool {
        !self.devices.is_empty() && self.devices.iter().all(|d| d.status == DeviceStatus::Success)
    }

    /// Stable column ordering for the external reporting collaborator:
    /// standard fields first, then sorted step names with
    /// `<step>_success`/`<step>_message` pairs.
    pub fn step_name_columns(&self) -> Vec<String> {
        let mut names: std::collections::BTreeSet<String> = std::collections::BTreeSet::new();
        for device in &self.devices {
            for (name, _) in &device.steps {
                names.insert(name.clone());
            }
        }
        names.into_iter().collect()
    }
}
