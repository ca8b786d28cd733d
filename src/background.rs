//! # Background Executor
//!
//! Fire-and-forget work scheduled from handlers (audit logging, cache
//! warm-up, outbound notifications). The dispatch core only defines the
//! [`BackgroundExecutor`] contract; a task's outcome never reaches the
//! request that scheduled it.
//!
//! - [`CoroutineExecutor`] runs each task on its own `may` coroutine with the
//!   configured stack size.
//! - [`InlineExecutor`] runs the task on the calling thread before returning.
//!
//! In both, a task that returns `Err` or panics is logged at `error` and
//! otherwise ignored.

use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{debug, error};

use crate::error::panic_message;
use crate::runtime_config::RuntimeConfig;

/// A unit of background work.
pub type BackgroundTask = Box<dyn FnOnce() -> anyhow::Result<()> + Send + 'static>;

/// Schedules [`BackgroundTask`]s.
pub trait BackgroundExecutor: Send + Sync {
    fn run(&self, task: BackgroundTask);
}

fn run_guarded(task: BackgroundTask) {
    match catch_unwind(AssertUnwindSafe(task)) {
        Ok(Ok(())) => debug!("Background task completed"),
        Ok(Err(e)) => error!(error = %format!("{e:#}"), "Background task failed"),
        Err(payload) => error!(
            panic_message = %panic_message(payload.as_ref()),
            "Background task panicked"
        ),
    }
}

/// Runs tasks on `may` coroutines.
#[derive(Debug, Clone, Copy)]
pub struct CoroutineExecutor {
    stack_size: usize,
}

impl CoroutineExecutor {
    #[must_use]
    pub fn new(stack_size: usize) -> Self {
        Self { stack_size }
    }

    #[must_use]
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::new(config.stack_size)
    }

    #[must_use]
    pub fn stack_size(&self) -> usize {
        self.stack_size
    }
}

impl Default for CoroutineExecutor {
    fn default() -> Self {
        Self::from_config(&RuntimeConfig::default())
    }
}

impl BackgroundExecutor for CoroutineExecutor {
    #[allow(unsafe_code)]
    fn run(&self, task: BackgroundTask) {
        // SAFETY: the task owns everything it captures ('static + Send) and
        // does not touch thread-local state shared with the spawner.
        let spawned = unsafe {
            may::coroutine::Builder::new()
                .name("switchyard-background".to_string())
                .stack_size(self.stack_size)
                .spawn(move || run_guarded(task))
        };
        if let Err(e) = spawned {
            error!(error = %e, stack_size = self.stack_size, "Failed to spawn background coroutine");
        }
    }
}

/// Runs tasks synchronously on the caller's thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineExecutor;

impl BackgroundExecutor for InlineExecutor {
    fn run(&self, task: BackgroundTask) {
        run_guarded(task);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn inline_executor_swallows_failures() {
        let ran = Arc::new(AtomicUsize::new(0));
        let exec = InlineExecutor;

        let r = Arc::clone(&ran);
        exec.run(Box::new(move || -> anyhow::Result<()> {
            r.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));
        exec.run(Box::new(|| -> anyhow::Result<()> { Err(anyhow::anyhow!("nope")) }));
        exec.run(Box::new(|| -> anyhow::Result<()> { panic!("boom") }));

        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn coroutine_executor_uses_configured_stack() {
        let config = RuntimeConfig {
            stack_size: 0x8000,
            ..RuntimeConfig::default()
        };
        assert_eq!(CoroutineExecutor::from_config(&config).stack_size(), 0x8000);
    }
}
