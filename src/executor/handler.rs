//! The capability the interpreter calls into
//!
//! An application provides a `TaskHandler`: state handlers named after states,
//! transition selectors named after block methods, and optionally schema
//! versions with update hooks. `HandlerCatalog` is the read-only half the
//! validator uses to cross-check a table against the code.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::context::HandlerContext;
use super::errors::{HandlerError, HandlerResult};
use crate::update::UpdateCoordinator;

/// A value a transition selector may return, with its meaning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredValue {
    pub method: String,
    pub value: String,
    pub description: String,
}

impl DeclaredValue {
    pub fn new(
        method: impl Into<String>,
        value: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into(),
            value: value.into(),
            description: description.into(),
        }
    }
}

/// Which handlers exist and what selectors may return.
pub trait HandlerCatalog {
    fn has_state(&self, state: &str) -> bool;

    fn has_transition(&self, method: &str) -> bool;

    fn declared_values(&self) -> Vec<DeclaredValue> {
        Vec::new()
    }
}

pub trait TaskHandler: HandlerCatalog {
    /// Run the handler for the state named by `ctx.state()`.
    ///
    /// Only called when `has_state` is true.
    fn enter_state(&mut self, ctx: &mut HandlerContext<'_>) -> HandlerResult;

    /// Run selector `method` for the current state and return the value
    /// to transition on.
    fn select_transition(
        &mut self,
        method: &str,
        ctx: &mut HandlerContext<'_>,
    ) -> HandlerResult<String>;

    /// Code-side schema version per component
    fn schema_versions(&self) -> BTreeMap<String, u32> {
        BTreeMap::new()
    }

    /// Run update hook `hook`. `None` when no such hook exists.
    fn run_update(
        &mut self,
        _hook: &str,
        _update: &mut UpdateCoordinator<'_>,
    ) -> Option<HandlerResult> {
        None
    }
}

/// A handler with no methods, for structure-only simulation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullHandler;

impl HandlerCatalog for NullHandler {
    fn has_state(&self, _state: &str) -> bool {
        false
    }

    fn has_transition(&self, _method: &str) -> bool {
        false
    }
}

impl TaskHandler for NullHandler {
    fn enter_state(&mut self, _ctx: &mut HandlerContext<'_>) -> HandlerResult {
        Ok(())
    }

    fn select_transition(
        &mut self,
        method: &str,
        _ctx: &mut HandlerContext<'_>,
    ) -> HandlerResult<String> {
        Err(HandlerError::new(format!("no selector '{}'", method)))
    }
}
