/// Monitoring engine module - drives host reachability
///
/// This module is responsible for:
/// - Probing hosts over ICMP
/// - Scheduling periodic and on-demand sweeps
/// - Firing SMS notifications on state transitions
pub mod notifier;
pub mod prober;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod testing;

pub use notifier::{HttpNotifier, Notifier};
pub use prober::{IcmpProber, ProbeOutcome, Prober};
pub use scheduler::{Pinger, Sweep};
