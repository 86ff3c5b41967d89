//! Launching and supervising the Sonic Pi server process.
//!
//! The server's ports are not fixed: a discovery helper shipped with the
//! install prints them, and the server is then launched with those ports as
//! positional arguments. This crate covers that whole sequence — install
//! layout resolution, best-effort session cleanup, port discovery, and the
//! supervised child process with banner-based readiness detection.

pub mod paths;
pub mod ports;
pub mod supervisor;

pub use paths::{ConfigurationError, InstallPaths};
pub use ports::{discover, run_init_script, DiscoveryError, PortTable};
pub use supervisor::{launch, ServerProcess, SupervisorEvent, READY_BANNER};
