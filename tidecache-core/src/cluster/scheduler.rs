//! Deferred side effects (delayed persistence and header writes)
//!
//! ```text
//! schedule(key, delay, task)
//!   ├─ Queue:    every scheduled task runs
//!   └─ Coalesce: a newer task for the same key aborts the pending one
//! ```

use crate::core::error::{CacheError, Result};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::{error, trace};

/// Callback for failures inside deferred tasks, which have no caller
pub type ErrorHook = Arc<dyn Fn(&CacheError) + Send + Sync>;

/// Hook that reports deferred failures through `tracing`
pub fn log_errors() -> ErrorHook {
    Arc::new(|err: &CacheError| error!("Deferred cache task failed: {}", err))
}

/// What happens when a task is scheduled while another with the same key is pending
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SchedulePolicy {
    /// Run every scheduled task
    #[default]
    Queue,
    /// Keep only the most recently scheduled task per key
    Coalesce,
}

/// Runs work after a delay without blocking the caller
pub trait Scheduler: Send + Sync {
    /// Run `task` once `delay` has elapsed
    ///
    /// Fails with `CacheError::Unscheduled` when the task cannot be queued;
    /// `task` is dropped in that case.
    fn schedule(&self, key: &str, delay: Duration, task: BoxFuture<'static, ()>) -> Result<()>;

    /// Abort every task that has not completed yet
    fn cancel_all(&self);

    /// Number of scheduled tasks that have not completed yet
    fn pending(&self) -> usize;
}

/// Scheduler spawning onto the tokio runtime
#[derive(Clone)]
pub struct TokioScheduler {
    policy: SchedulePolicy,
    handle: Option<Handle>,
    tasks: Arc<Mutex<HashMap<String, Vec<AbortHandle>>>>,
}

impl TokioScheduler {
    /// Scheduler that spawns onto the runtime current at scheduling time
    pub fn new(policy: SchedulePolicy) -> Self {
        Self {
            policy,
            handle: None,
            tasks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Scheduler bound to a specific runtime
    pub fn with_handle(policy: SchedulePolicy, handle: Handle) -> Self {
        Self {
            handle: Some(handle),
            ..Self::new(policy)
        }
    }

    pub fn policy(&self) -> SchedulePolicy {
        self.policy
    }

    fn runtime(&self) -> Option<Handle> {
        self.handle.clone().or_else(|| Handle::try_current().ok())
    }
}

impl Default for TokioScheduler {
    fn default() -> Self {
        Self::new(SchedulePolicy::default())
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, key: &str, delay: Duration, task: BoxFuture<'static, ()>) -> Result<()> {
        let Some(runtime) = self.runtime() else {
            return Err(CacheError::Unscheduled(format!(
                "no tokio runtime for key={}",
                key
            )));
        };

        let mut tasks = self.tasks.lock();
        prune_finished(&mut tasks);
        let pending = tasks.entry(key.to_string()).or_default();

        if self.policy == SchedulePolicy::Coalesce {
            for handle in pending.drain(..) {
                trace!("Coalescing deferred task key={}", key);
                handle.abort();
            }
        }

        let join = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
        pending.push(join.abort_handle());
        trace!("Scheduled task key={} delay={:?}", key, delay);
        Ok(())
    }

    fn cancel_all(&self) {
        let mut tasks = self.tasks.lock();
        for handle in tasks.drain().flat_map(|(_, handles)| handles) {
            handle.abort();
        }
    }

    fn pending(&self) -> usize {
        let mut tasks = self.tasks.lock();
        prune_finished(&mut tasks);
        tasks.values().map(Vec::len).sum()
    }
}

/// Drop finished handles and keys with nothing left pending
fn prune_finished(tasks: &mut HashMap<String, Vec<AbortHandle>>) {
    tasks.retain(|_, handles| {
        handles.retain(|handle| !handle.is_finished());
        !handles.is_empty()
    });
}
