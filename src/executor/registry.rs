//! Closure-table handler
//!
//! Registers handlers by name instead of dispatching on method names at
//! runtime. The registry owns the application's task data `T` and passes it
//! to every closure.
//!
//! ```ignore
//! let handler = HandlerRegistry::new(Job::default())
//!     .state("poll", |job, _ctx| job.submit())
//!     .transition("checkJob", &[("done", "job finished"), ("retry", "still running")], |job, _ctx| {
//!         Ok(if job.is_done() { "done" } else { "retry" }.to_string())
//!     })
//!     .version("job", 2)
//!     .update("updateJob2", |_job, update| {
//!         update.reset_all_counters();
//!         Ok(())
//!     });
//! ```

use std::collections::{BTreeMap, HashMap};

use super::context::HandlerContext;
use super::errors::HandlerResult;
use super::handler::{DeclaredValue, HandlerCatalog, TaskHandler};
use crate::update::UpdateCoordinator;

type StateFn<T> = Box<dyn FnMut(&mut T, &mut HandlerContext<'_>) -> HandlerResult + Send>;
type SelectFn<T> = Box<dyn FnMut(&mut T, &mut HandlerContext<'_>) -> HandlerResult<String> + Send>;
type UpdateFn<T> = Box<dyn FnMut(&mut T, &mut UpdateCoordinator<'_>) -> HandlerResult + Send>;

pub struct HandlerRegistry<T> {
    task: T,
    states: HashMap<String, StateFn<T>>,
    transitions: HashMap<String, SelectFn<T>>,
    declared: Vec<DeclaredValue>,
    versions: BTreeMap<String, u32>,
    updates: HashMap<String, UpdateFn<T>>,
}

impl<T> HandlerRegistry<T> {
    pub fn new(task: T) -> Self {
        Self {
            task,
            states: HashMap::new(),
            transitions: HashMap::new(),
            declared: Vec::new(),
            versions: BTreeMap::new(),
            updates: HashMap::new(),
        }
    }

    /// Register the handler for `state`
    pub fn state<F>(mut self, state: &str, handler: F) -> Self
    where
        F: FnMut(&mut T, &mut HandlerContext<'_>) -> HandlerResult + Send + 'static,
    {
        self.states.insert(state.to_string(), Box::new(handler));
        self
    }

    /// Register selector `method` with the `(value, description)` pairs it
    /// may return
    pub fn transition<F>(mut self, method: &str, values: &[(&str, &str)], selector: F) -> Self
    where
        F: FnMut(&mut T, &mut HandlerContext<'_>) -> HandlerResult<String> + Send + 'static,
    {
        self.declared.retain(|d| d.method != method);
        self.declared.extend(
            values
                .iter()
                .map(|(value, description)| DeclaredValue::new(method, *value, *description)),
        );
        self.transitions.insert(method.to_string(), Box::new(selector));
        self
    }

    /// Declare the code-side schema version of `component`
    pub fn version(mut self, component: &str, version: u32) -> Self {
        self.versions.insert(component.to_string(), version);
        self
    }

    /// Register an update hook, named `update{Component}{N}`
    pub fn update<F>(mut self, hook: &str, f: F) -> Self
    where
        F: FnMut(&mut T, &mut UpdateCoordinator<'_>) -> HandlerResult + Send + 'static,
    {
        self.updates.insert(hook.to_string(), Box::new(f));
        self
    }

    pub fn task(&self) -> &T {
        &self.task
    }

    pub fn task_mut(&mut self) -> &mut T {
        &mut self.task
    }

    pub fn into_task(self) -> T {
        self.task
    }
}

impl<T: Default> Default for HandlerRegistry<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> HandlerCatalog for HandlerRegistry<T> {
    fn has_state(&self, state: &str) -> bool {
        self.states.contains_key(state)
    }

    fn has_transition(&self, method: &str) -> bool {
        self.transitions.contains_key(method)
    }

    fn declared_values(&self) -> Vec<DeclaredValue> {
        self.declared.clone()
    }
}

impl<T> TaskHandler for HandlerRegistry<T> {
    fn enter_state(&mut self, ctx: &mut HandlerContext<'_>) -> HandlerResult {
        match self.states.get_mut(ctx.state()) {
            Some(handler) => handler(&mut self.task, ctx),
            None => Err(format!("no state handler for '{}'", ctx.state()).into()),
        }
    }

    fn select_transition(
        &mut self,
        method: &str,
        ctx: &mut HandlerContext<'_>,
    ) -> HandlerResult<String> {
        match self.transitions.get_mut(method) {
            Some(selector) => selector(&mut self.task, ctx),
            None => Err(format!("no transition selector '{}'", method).into()),
        }
    }

    fn schema_versions(&self) -> BTreeMap<String, u32> {
        self.versions.clone()
    }

    fn run_update(
        &mut self,
        hook: &str,
        update: &mut UpdateCoordinator<'_>,
    ) -> Option<HandlerResult> {
        let f = self.updates.get_mut(hook)?;
        Some(f(&mut self.task, update))
    }
}
