//! The stepwise interpreter
//!
//! One `step()` takes one transition: ask the current block's selector for a
//! value, resolve it to a transition, enter the target state and return the
//! transition's wait. Errors inside a step are routed through `!` to the
//! `failure` state; only problems the task can't recover from surface as
//! `InterpreterError`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use super::context::HandlerContext;
use super::errors::{HandlerError, InterpreterError, InterpreterResult, StepError};
use super::handler::{HandlerCatalog, TaskHandler};
use super::state::{Phase, TaskState};
use crate::metrics::{MetricsSink, TracingMetrics};
use crate::model::{
    is_builtin_state, StateMachine, Transition, DEFAULT_TIMER, DEFAULT_TRANSITION_METHOD,
    ERROR_VALUE, FAILURE_STATE, FINISH_STATE, TERMINATE_REQUESTED, TERMINATE_STATE,
};
use crate::parser::semantic_validator::{self, ValidationResult};
use crate::recording::{Recording, TransitionOrigin};
use crate::signals::{NoSignals, SignalSource, TerminationSignal};
use crate::simulation::TransitionSource;
use crate::types::{ExitStatus, StepResult, TaskStatus};
use crate::update::apply_updates;

/// Seconds a paused step asks the scheduler to wait
pub const DEFAULT_PAUSE_WAIT: u64 = 60;

/// Routing depth of a state entry. Handler errors at `Normal` depth fall
/// back through the state's own `!`; deeper errors go straight to `failure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Depth {
    Normal,
    Fallback,
    Last,
}

impl Depth {
    fn next(self) -> Self {
        match self {
            Depth::Normal => Depth::Fallback,
            Depth::Fallback | Depth::Last => Depth::Last,
        }
    }
}

/// Operator switch that halts selector evaluation. Clones share the flag.
#[derive(Debug, Clone, Default)]
pub struct PauseFlag(Arc<AtomicBool>);

impl PauseFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/* ===================== Builder ===================== */

/// Start building an interpreter for `machine` driven by `handler`
pub fn initialize<H: TaskHandler>(machine: StateMachine, handler: H) -> InterpreterBuilder<H> {
    InterpreterBuilder::new(machine, handler)
}

pub struct InterpreterBuilder<H: TaskHandler> {
    machine: StateMachine,
    handler: H,
    task_id: Option<String>,
    resume: Option<TaskState>,
    signals: Box<dyn SignalSource>,
    metrics: Box<dyn MetricsSink>,
    simulation: Option<Box<dyn TransitionSource>>,
    pause: PauseFlag,
    pause_wait: u64,
}

impl<H: TaskHandler> InterpreterBuilder<H> {
    pub fn new(machine: StateMachine, handler: H) -> Self {
        Self {
            machine,
            handler,
            task_id: None,
            resume: None,
            signals: Box::new(NoSignals),
            metrics: Box::new(TracingMetrics),
            simulation: None,
            pause: PauseFlag::default(),
            pause_wait: DEFAULT_PAUSE_WAIT,
        }
    }

    /// Defaults to a random UUID
    pub fn task_id(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    /// Continue a task from a snapshot; pending update hooks run on `build`
    pub fn resume_from(mut self, state: TaskState) -> Self {
        self.resume = Some(state);
        self
    }

    pub fn signals(mut self, signals: impl SignalSource + 'static) -> Self {
        self.signals = Box::new(signals);
        self
    }

    pub fn metrics(mut self, metrics: impl MetricsSink + 'static) -> Self {
        self.metrics = Box::new(metrics);
        self
    }

    pub fn simulation(mut self, source: impl TransitionSource + 'static) -> Self {
        self.simulation = Some(Box::new(source));
        self
    }

    pub fn pause_flag(mut self, pause: PauseFlag) -> Self {
        self.pause = pause;
        self
    }

    pub fn pause_wait(mut self, seconds: u64) -> Self {
        self.pause_wait = seconds;
        self
    }

    pub fn build(mut self) -> InterpreterResult<Interpreter<H>> {
        self.machine.start_state()?;

        let state = match self.resume {
            Some(mut state) => {
                let hash = self.machine.source_hash();
                if !hash.is_empty() && !state.table_hash.is_empty() && state.table_hash != hash {
                    warn!(
                        task_id = %state.task_id,
                        stored = %state.table_hash,
                        current = %hash,
                        "State table changed since the task was saved"
                    );
                }
                apply_updates(&mut self.handler, &self.machine, &mut state)?;
                state.table_hash = hash.to_string();
                state
            }
            None => {
                let task_id = self
                    .task_id
                    .unwrap_or_else(|| Uuid::new_v4().to_string());
                let mut state = TaskState::new(task_id, self.machine.source_hash());
                state.versions = self.handler.schema_versions();
                state
            }
        };

        Ok(Interpreter {
            machine: self.machine,
            handler: self.handler,
            state,
            signals: self.signals,
            metrics: self.metrics,
            simulation: self.simulation,
            pause: self.pause,
            pause_wait: self.pause_wait,
        })
    }
}

/* ===================== Interpreter ===================== */

pub struct Interpreter<H: TaskHandler> {
    machine: StateMachine,
    handler: H,
    state: TaskState,
    signals: Box<dyn SignalSource>,
    metrics: Box<dyn MetricsSink>,
    simulation: Option<Box<dyn TransitionSource>>,
    pause: PauseFlag,
    pause_wait: u64,
}

impl<H: TaskHandler> Interpreter<H> {
    pub fn builder(machine: StateMachine, handler: H) -> InterpreterBuilder<H> {
        InterpreterBuilder::new(machine, handler)
    }

    /* ---------- Accessors ---------- */

    pub fn task_id(&self) -> &str {
        &self.state.task_id
    }

    pub fn current_state(&self) -> Option<&str> {
        self.state.current_state.as_deref()
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn is_complete(&self) -> bool {
        self.state.phase.is_terminal()
    }

    pub fn exit_status(&self) -> Option<&ExitStatus> {
        self.state.exit.as_ref()
    }

    pub fn recording(&self) -> &Recording {
        &self.state.recording
    }

    pub fn machine(&self) -> &StateMachine {
        &self.machine
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn state(&self) -> &TaskState {
        &self.state
    }

    pub fn pause_flag(&self) -> PauseFlag {
        self.pause.clone()
    }

    /// Serializable copy of the runtime state
    pub fn snapshot(&self) -> TaskState {
        self.state.clone()
    }

    /* ---------- Operations ---------- */

    /// Check the table against the handler, logging every issue found
    pub fn validate(&self) -> ValidationResult {
        let result = semantic_validator::validate(
            &self.machine,
            None,
            Some(&self.handler as &dyn HandlerCatalog),
        );
        for issue in result.issues() {
            warn!(task_id = %self.state.task_id, state = %issue.state, "{}", issue);
        }
        result
    }

    /// Replace selectors with `source` until cleared. The source is rewound.
    pub fn set_simulation(&mut self, mut source: impl TransitionSource + 'static) {
        source.reset();
        self.simulation = Some(Box::new(source));
    }

    pub fn clear_simulation(&mut self) {
        self.simulation = None;
    }

    pub fn is_simulating(&self) -> bool {
        self.simulation.is_some()
    }

    /// Reset the counter of transition `value` (exact, else `*`) leaving
    /// `state`. Returns false when neither is declared.
    pub fn clear_transition_count(&mut self, state: &str, value: &str) -> InterpreterResult<bool> {
        Ok(self
            .state
            .clear_transition_count(&self.machine, state, value)?)
    }

    /// Take one transition.
    pub fn step(&mut self) -> InterpreterResult<StepResult> {
        let span = info_span!("step", task_id = %self.state.task_id);
        let _enter = span.enter();

        if self.is_complete() {
            return Ok(self.completed(0));
        }

        if let Some(signal) = self.signals.pending_termination(&self.state.task_id) {
            self.signals.consume(&self.state.task_id, signal.id);
            return self.terminate(&signal);
        }

        if self.pause.is_paused() {
            debug!("Paused, skipping step");
            return Ok(StepResult::running(self.pause_wait));
        }

        match self.state.phase {
            Phase::NotStarted => self.start(),
            _ => self.advance(),
        }
    }

    /* ---------- Step Phases ---------- */

    fn start(&mut self) -> InterpreterResult<StepResult> {
        let start = self.machine.start_state()?.to_string();
        let now = Utc::now();
        self.state.phase = Phase::Running;
        self.state.recording.mark_started(now);
        info!(state = %start, "Starting task");

        // Entering start and taking its first transition is one step
        self.arrive(&start, true);
        if self.simulation.is_none() {
            if let Err(err) = self.invoke_state(&start, None) {
                return self.state_failed(&start, err, 0, Depth::Normal);
            }
        }
        self.advance()
    }

    fn advance(&mut self) -> InterpreterResult<StepResult> {
        let Some(current) = self.state.current_state.clone() else {
            return self.start();
        };
        let block = match self.machine.transition_block(&current) {
            Ok(block) => block.clone(),
            Err(err) => return self.advance_without_block(&current, err.into()),
        };
        let method = block.method().to_string();

        let mut selected: Option<String> = None;
        let mut forced: Option<String> = None;
        let mut cause: Option<String> = None;
        loop {
            if self.pause.is_paused() {
                debug!(state = %current, "Paused during selection");
                return Ok(StepResult::running(self.pause_wait));
            }

            let value = match forced.take() {
                Some(value) => value,
                None => match self.select(&current, &method)? {
                    Ok(value) => {
                        debug!(state = %current, value = %value, "Selected");
                        selected = Some(value.clone());
                        value
                    }
                    Err(err) => {
                        warn!(state = %current, error = %err, "Selector failed");
                        cause = Some(StepError::handler(&method, err).to_string());
                        ERROR_VALUE.to_string()
                    }
                },
            };

            match self.resolve(&current, &block, &value) {
                Ok(transition) => {
                    let requested = selected.as_deref().filter(|s| *s != value);
                    if value == ERROR_VALUE && cause.is_none() {
                        cause = Some(format!("'{}' returned '!' in state '{}'", method, current));
                    }
                    return self.take_transition(
                        &current,
                        &method,
                        &value,
                        requested,
                        TransitionOrigin::Selector,
                        transition,
                        cause,
                        Depth::Normal,
                    );
                }
                Err(err) => {
                    warn!(state = %current, value = %value, error = %err, "Falling back to '!'");
                    cause = Some(err.to_string());
                    forced = Some(ERROR_VALUE.to_string());
                }
            }
        }
    }

    /// The current state has no block of its own
    fn advance_without_block(
        &mut self,
        current: &str,
        err: StepError,
    ) -> InterpreterResult<StepResult> {
        match current {
            FINISH_STATE => {
                self.complete(Phase::Finished, TaskStatus::Succeeded, None);
                Ok(self.completed(0))
            }
            TERMINATE_STATE => {
                self.complete(Phase::Terminated, TaskStatus::Terminated, None);
                Ok(self.completed(0))
            }
            FAILURE_STATE => {
                let cause = self
                    .state
                    .exit
                    .as_ref()
                    .and_then(|e| e.message.clone())
                    .unwrap_or_else(|| err.to_string());
                self.state.exit = Some(ExitStatus::new(TaskStatus::SystemError, Some(cause.clone())));
                self.complete(Phase::Finished, TaskStatus::SystemError, None);
                Err(InterpreterError::Unrecoverable {
                    state: FAILURE_STATE.to_string(),
                    cause,
                })
            }
            _ => {
                warn!(state = %current, error = %err, "Dangling state, routing to failure");
                self.take_transition(
                    current,
                    DEFAULT_TRANSITION_METHOD,
                    ERROR_VALUE,
                    None,
                    TransitionOrigin::Fallback,
                    Transition::synthetic_failure(),
                    Some(err.to_string()),
                    Depth::Fallback,
                )
            }
        }
    }

    fn terminate(&mut self, signal: &TerminationSignal) -> InterpreterResult<StepResult> {
        let reason = signal
            .reason
            .clone()
            .unwrap_or_else(|| "termination requested".to_string());
        info!(signal_id = %signal.id, reason = %reason, "Terminating task");

        match self.state.phase {
            Phase::NotStarted => {
                if self.simulation.is_none() && self.handler.has_state(TERMINATE_STATE) {
                    if let Err(err) = self.invoke_state(TERMINATE_STATE, Some(&reason)) {
                        warn!(error = %err, "Terminate handler failed");
                    }
                }
                self.complete(Phase::Terminated, TaskStatus::Terminated, Some(reason));
            }
            _ if self.machine.has_block(TERMINATE_STATE) => {
                let from = self.state.current_state.clone().unwrap_or_default();
                let method = self
                    .machine
                    .transition_block(&from)
                    .map(|b| b.method().to_string())
                    .unwrap_or_else(|_| DEFAULT_TRANSITION_METHOD.to_string());
                self.state.recording.add_transition(
                    &from,
                    &method,
                    TERMINATE_REQUESTED,
                    None,
                    TransitionOrigin::Signal,
                );
                self.arrive(TERMINATE_STATE, true);
                if self.simulation.is_none() {
                    if let Err(err) = self.invoke_state(TERMINATE_STATE, Some(&reason)) {
                        warn!(error = %err, "Terminate handler failed");
                    }
                }
                self.state.exit = Some(ExitStatus::new(TaskStatus::Terminated, Some(reason)));
                self.complete(Phase::Terminated, TaskStatus::Terminated, None);
            }
            _ => {
                self.state.exit = Some(ExitStatus::new(TaskStatus::Terminated, Some(reason)));
                self.complete(Phase::Terminated, TaskStatus::Terminated, None);
            }
        }
        Ok(self.completed(0))
    }

    /* ---------- Transitions ---------- */

    /// Ask the selector (or the simulation) for a value. The outer error is
    /// fatal, the inner one is the handler's and gets routed to `!`.
    fn select(
        &mut self,
        state: &str,
        method: &str,
    ) -> InterpreterResult<Result<String, HandlerError>> {
        if let Some(simulation) = self.simulation.as_mut() {
            return Ok(Ok(simulation.next_value(state, method)?));
        }
        if !self.handler.has_transition(method) {
            if method == DEFAULT_TRANSITION_METHOD {
                return Ok(Ok(String::new()));
            }
            return Ok(Err(HandlerError::new(format!(
                "no transition selector '{}'",
                method
            ))));
        }

        let TaskState {
            task_id,
            contexts,
            exit,
            ..
        } = &mut self.state;
        let context = contexts.entry(state.to_string()).or_default();
        let mut ctx = HandlerContext::new(task_id, state, context, exit, None);
        Ok(self.handler.select_transition(method, &mut ctx))
    }

    /// Resolve `value` in `block`, enforcing per-declaration limits
    fn resolve(
        &self,
        state: &str,
        block: &crate::model::TransitionBlock,
        value: &str,
    ) -> Result<Transition, StepError> {
        let Some(transition) = block.find_next_transition(value) else {
            if value == ERROR_VALUE {
                return Ok(Transition::synthetic_failure());
            }
            return Err(StepError::UnknownValue {
                state: state.to_string(),
                value: value.to_string(),
            });
        };

        if transition.max() > 0 && self.state.transition_count(transition.id()) >= transition.max() {
            if transition.value() == ERROR_VALUE {
                debug!(state = %state, "'!' route exhausted, using failure");
                return Ok(Transition::synthetic_failure());
            }
            return Err(StepError::LimitExceeded {
                state: state.to_string(),
                value: value.to_string(),
                max: transition.max(),
            });
        }
        Ok(transition)
    }

    #[allow(clippy::too_many_arguments)]
    fn take_transition(
        &mut self,
        from: &str,
        method: &str,
        value: &str,
        requested: Option<&str>,
        origin: TransitionOrigin,
        transition: Transition,
        cause: Option<String>,
        depth: Depth,
    ) -> InterpreterResult<StepResult> {
        self.state
            .recording
            .add_transition(from, method, value, requested, origin);
        if !transition.is_synthetic() {
            let count = self.state.increment(transition.id());
            debug!(line = transition.line(), count, "Transition counted");
        }
        info!(
            from = %from,
            value = %value,
            to = %transition.target(),
            "Transition"
        );

        let cause = cause.or_else(|| {
            (transition.target() == FAILURE_STATE)
                .then(|| format!("transition '{}' from '{}'", value, from))
        });
        self.enter_state(
            transition.target(),
            transition.exec(),
            cause,
            transition.wait(),
            depth,
        )
    }

    /* ---------- States ---------- */

    /// Make `state` current: visit, timer, recording
    fn arrive(&mut self, state: &str, exec: bool) {
        let now = Utc::now();
        self.state.current_state = Some(state.to_string());
        self.state
            .contexts
            .entry(state.to_string())
            .or_default()
            .record_visit(now);

        let timer = self
            .machine
            .transition_block(state)
            .map(|b| b.timer().to_string())
            .unwrap_or_else(|_| DEFAULT_TIMER.to_string());
        self.state.timers.engage(&timer, now, self.state.created_at);

        // Simulation skips handlers but still records the declared exec flag
        self.state.recording.add_state(state, exec);
    }

    fn enter_state(
        &mut self,
        state: &str,
        exec: bool,
        cause: Option<String>,
        wait: u32,
        depth: Depth,
    ) -> InterpreterResult<StepResult> {
        self.arrive(state, exec);

        if state == FAILURE_STATE {
            let message = cause.clone().unwrap_or_else(|| "entered failure".to_string());
            self.state
                .exit
                .get_or_insert_with(|| ExitStatus::new(TaskStatus::Failed, Some(message)));
        }

        if exec && self.simulation.is_none() {
            if let Err(err) = self.invoke_state(state, cause.as_deref()) {
                return self.state_failed(state, err, wait, depth);
            }
        }

        if state == FINISH_STATE {
            self.complete(Phase::Finished, TaskStatus::Succeeded, None);
            return Ok(self.completed(wait));
        }
        Ok(StepResult::running(u64::from(wait)))
    }

    /// Route a state handler error
    fn state_failed(
        &mut self,
        state: &str,
        err: HandlerError,
        wait: u32,
        depth: Depth,
    ) -> InterpreterResult<StepResult> {
        if state == FAILURE_STATE {
            warn!(error = %err, "Failure handler raised, ignoring");
            return Ok(StepResult::running(u64::from(wait)));
        }

        let step_err = StepError::handler(state, err);
        warn!(state = %state, error = %step_err, "State handler failed");

        let block = self.machine.transition_block(state).ok().cloned();
        let method = block
            .as_ref()
            .map(|b| b.method().to_string())
            .unwrap_or_else(|| DEFAULT_TRANSITION_METHOD.to_string());

        let transition = match (&block, depth) {
            (Some(block), Depth::Normal) => self
                .resolve(state, block, ERROR_VALUE)
                .unwrap_or_else(|_| Transition::synthetic_failure()),
            _ => Transition::synthetic_failure(),
        };

        self.take_transition(
            state,
            &method,
            ERROR_VALUE,
            None,
            TransitionOrigin::Fallback,
            transition,
            Some(step_err.to_string()),
            depth.next(),
        )
    }

    /// Run the handler for `state`. Built-in states without one succeed.
    fn invoke_state(&mut self, state: &str, cause: Option<&str>) -> Result<(), HandlerError> {
        if !self.handler.has_state(state) {
            if is_builtin_state(state) {
                return Ok(());
            }
            return Err(HandlerError::new(format!("no state handler for '{}'", state)));
        }

        let TaskState {
            task_id,
            contexts,
            exit,
            ..
        } = &mut self.state;
        let context = contexts.entry(state.to_string()).or_default();
        let mut ctx = HandlerContext::new(task_id, state, context, exit, cause);
        self.handler.enter_state(&mut ctx)
    }

    /* ---------- Completion ---------- */

    /// Move to a terminal phase. `status` applies only if no exit status is set.
    fn complete(&mut self, phase: Phase, status: TaskStatus, message: Option<String>) {
        let now = Utc::now();
        self.state.phase = phase;
        self.state
            .exit
            .get_or_insert_with(|| ExitStatus::new(status, message));

        self.state.timers.stop(now);
        // Timings are only reported for runs that reach `finish`
        if self.state.current_state.as_deref() == Some(FINISH_STATE) {
            for (name, millis) in self.state.timers.durations() {
                self.metrics.timing(name, *millis);
            }
        }
        self.state.recording.mark_ended(now);

        let exit = self.state.exit.as_ref();
        info!(
            status = %exit.map(|e| e.status).unwrap_or(status),
            "Task complete"
        );
    }

    fn completed(&self, wait: u32) -> StepResult {
        let exit = self.state.exit.clone().unwrap_or_else(|| {
            let status = match self.state.phase {
                Phase::Terminated => TaskStatus::Terminated,
                _ => TaskStatus::Succeeded,
            };
            ExitStatus::new(status, None)
        });
        StepResult::completed(&exit, u64::from(wait))
    }
}
