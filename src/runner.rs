//! Local runner
//!
//! Drives an interpreter to completion in-process, standing in for the
//! external scheduler: it calls `step()` in a loop and, when asked to, sleeps
//! for the wait each step returns.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::executor::{Interpreter, TaskHandler};
use crate::types::StepResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Stop after this many steps even if the task is still running
    pub max_steps: usize,
    /// Sleep for each returned wait instead of stepping straight through
    pub honor_waits: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_steps: 1000,
            honor_waits: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub steps: usize,
    /// Result of the last step taken
    pub last: StepResult,
    /// True when the loop stopped on `max_steps` rather than completion
    pub reached_limit: bool,
}

pub async fn run_until_complete<H: TaskHandler>(
    interpreter: &mut Interpreter<H>,
    options: RunOptions,
) -> Result<RunSummary> {
    let mut steps = 0;
    let mut last = StepResult::running(0);

    while steps < options.max_steps {
        steps += 1;
        last = interpreter
            .step()
            .with_context(|| format!("step {} of task {} failed", steps, interpreter.task_id()))?;
        debug!(
            task_id = %interpreter.task_id(),
            step = steps,
            state = ?interpreter.current_state(),
            wait = last.wait,
            "step finished"
        );

        if last.complete {
            info!(
                task_id = %interpreter.task_id(),
                steps,
                status = %last.status,
                "task complete"
            );
            return Ok(RunSummary {
                steps,
                last,
                reached_limit: false,
            });
        }

        if options.honor_waits && last.wait > 0 {
            tokio::time::sleep(Duration::from_secs(last.wait)).await;
        }
    }

    warn!(
        task_id = %interpreter.task_id(),
        max_steps = options.max_steps,
        state = ?interpreter.current_state(),
        "step limit reached before completion"
    );
    Ok(RunSummary {
        steps,
        last,
        reached_limit: true,
    })
}
