//! natsync daemon: reload signaling, the reconciliation loop, and process
//! plumbing (tracing setup, signal handling).

pub mod error;
pub mod logging;
pub mod reload;
pub mod runtime;

pub use error::{DaemonError, ReloadError};
pub use logging::init_tracing;
pub use reload::{ReloadOutcome, ReloadSignaler};
pub use runtime::{run_once_blocking, start_blocking, CycleReport, Orchestrator, RunSummary};
