pub mod interfaces;
pub mod orchestrator;
pub mod plan;
pub mod record;

pub use interfaces::{list_interfaces, NetworkInterface};
pub use orchestrator::{run_sequential, run_with_concurrency, DiscoveredDevice, OrchestratorConfig};
pub use plan::{AssignmentPlan, AssignmentPlanner, PlanRow};
pub use record::{DeviceRecord, DeviceStatus, ResultRecord, StepOutcome};
