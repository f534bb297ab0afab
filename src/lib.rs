#![forbid(unsafe_code)]

//! Process-farm supervisor and concurrent protocol harness for grading a
//! chained HTTP proxy.
//!
//! The library is shared by two binaries: `proxy-harness` (launches a local
//! proxy chain and drives one named scenario against it) and `proxy-farm`
//! (spawns and supervises remote proxy instances for interactive use).

pub mod cleanup;
pub mod client;
pub mod config;
pub mod errors;
pub mod farm;
pub mod scenario;

pub use config::HarnessConfig;
pub use errors::{HarnessError, Result};
