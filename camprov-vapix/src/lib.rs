pub mod calls;
pub mod classify;
pub mod client;
pub mod prober;
pub mod waiter;

pub use client::VapixClient;
pub use prober::probe;
pub use waiter::{wait_for_reachable, wait_for_reachable_on_port, ReachabilityOutcome};
