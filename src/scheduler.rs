pub mod cadence;
pub mod daemon;
pub mod jobs;

pub use daemon::spawn_kst_daemons;
pub use jobs::{JobKind, JobOutput, JobSettings, Scheduler, UnknownJobKind};
