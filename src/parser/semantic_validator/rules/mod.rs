//! Validation Rules
//!
//! Each file in this module contains one validation rule:
//!
//! - `required_states.rs` - `failure` and `terminate` must have blocks
//! - `reachability.rs` - Dangling targets and states that never reach `finish`
//! - `spin_transition.rs` - Self-transitions with no wait
//! - `handler_methods.rs` - State handlers and selectors the table needs
//! - `transition_values.rs` - Table values vs. values the selectors declare

mod handler_methods;
mod reachability;
mod required_states;
mod spin_transition;
mod transition_values;

pub use handler_methods::HandlerMethodsRule;
pub use reachability::ReachabilityRule;
pub use required_states::RequiredStatesRule;
pub use spin_transition::SpinTransitionRule;
pub use transition_values::TransitionValuesRule;
