pub mod compression;
pub mod job;
pub mod naming;
pub mod restore;
pub mod scheduler;
mod shutdown;
#[cfg(test)]
mod test_support;

pub use job::ArchiveJob;
pub use restore::RestoreJob;
pub use scheduler::{parse_timezone, run_scheduler, CronSchedule};
pub use shutdown::Shutdown;
