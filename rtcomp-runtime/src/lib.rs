//! The component runtime: the per-`(component, ec)` lifecycle state machine
//! and the periodic execution context that drives it.

pub mod execution_context;
pub mod lifecycle;

pub use execution_context::PeriodicExecutionContext;
pub use lifecycle::{ComponentLifecycle, EcState, RtcHooks};
