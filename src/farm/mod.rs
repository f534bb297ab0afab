//! Process farm: spawning, supervising, and chaining proxy instances.

pub mod launcher;
pub mod supervisor;

pub use launcher::{Chain, ChainHost, ChainLauncher, Topology};
pub use supervisor::{LaunchSpec, Supervisor, SupervisorHandle};
