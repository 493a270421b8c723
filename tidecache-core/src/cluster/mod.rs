//! Cache clusters: groups of stores sharing persistence, expiry stamps and
//! conditional headers

pub mod cache_cluster;
pub mod clock;
pub mod headers;
pub mod registry;
pub mod scheduler;

pub use cache_cluster::{Cluster, ClusterBuilder};
pub use clock::{Clock, ManualClock, SystemClock};
pub use headers::{HeaderEntry, ModifiedHeaders};
pub use registry::ClusterRegistry;
pub use scheduler::{ErrorHook, SchedulePolicy, Scheduler, TokioScheduler, log_errors};
