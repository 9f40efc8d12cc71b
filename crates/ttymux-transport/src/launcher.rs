//! In-process context launcher: every secondary is a tokio task.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use async_trait::async_trait;
use futures::stream::BoxStream;
use tokio::task::AbortHandle;
use ttymux_core::{
    BindingParams, Bus, ContextHandle, ContextLauncher, LaunchError, MuxConfig, Surface, Unit,
};

use crate::runtime::SecondaryContext;

/// Local I/O of a freshly launched secondary.
pub struct SessionIo {
    pub surface: Arc<dyn Surface>,
    pub keystrokes: BoxStream<'static, String>,
}

/// Builds the surface and keystroke source for a unit.
pub type SessionIoFactory = Arc<dyn Fn(Unit) -> SessionIo + Send + Sync>;

/// Handle to a secondary running as a task.
pub struct TaskHandle {
    task: AbortHandle,
}

impl ContextHandle for TaskHandle {
    fn is_alive(&self) -> bool {
        !self.task.is_finished()
    }

    fn terminate(&self) {
        self.task.abort();
    }
}

/// Launches `SecondaryContext`s as tasks on the current runtime.
pub struct TaskLauncher {
    bus: Arc<dyn Bus>,
    config: MuxConfig,
    factory: SessionIoFactory,
    limit: Option<usize>,
    tasks: Mutex<HashMap<Unit, Arc<TaskHandle>>>,
}

impl TaskLauncher {
    #[must_use]
    pub fn new(bus: Arc<dyn Bus>, config: MuxConfig, factory: SessionIoFactory) -> Self {
        Self {
            bus,
            config,
            factory,
            limit: None,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Refuse launches while `limit` launched contexts are alive.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Abort a unit's context without letting it unregister, as a crashed
    /// or force-closed host context would.
    ///
    /// Returns `false` if no context was launched for `unit`.
    pub fn kill(&self, unit: Unit) -> bool {
        let Some(handle) = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&unit)
        else {
            return false;
        };
        handle.terminate();
        true
    }

    /// Number of launched contexts still running.
    #[must_use]
    pub fn live_count(&self) -> usize {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.retain(|_, handle| handle.is_alive());
        tasks.len()
    }
}

#[async_trait]
impl ContextLauncher for TaskLauncher {
    async fn launch(&self, params: BindingParams) -> Result<Arc<dyn ContextHandle>, LaunchError> {
        if let Some(limit) = self.limit {
            if self.live_count() >= limit {
                return Err(LaunchError::Blocked(format!(
                    "host allows at most {limit} extra contexts"
                )));
            }
        }

        // The new context only learns its unit from the creation query.
        let query = params.to_query();
        let io = (self.factory)(params.unit);
        let context =
            SecondaryContext::from_query(Arc::clone(&self.bus), &query, io.surface, &self.config)
                .map_err(|e| LaunchError::Failed(e.to_string()))?;

        let task = tokio::spawn(context.run(io.keystrokes));
        let handle = Arc::new(TaskHandle {
            task: task.abort_handle(),
        });
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(params.unit, Arc::clone(&handle));

        tracing::debug!(query = %query, "Launched secondary task");
        Ok(handle as Arc<dyn ContextHandle>)
    }
}
