//! Tripwright Runtime
//!
//! A reference dispatch loop around the engines: it routes user text to
//! events, executes the operations the decision engine asks for through an
//! [`OperationDispatcher`], folds their results, keeps the audit trail and
//! persists the document after every mutation. Two runaway guards bound
//! each turn.
//!
//! This crate performs no I/O of its own beyond the dispatcher and the
//! document store it is given.

pub mod dispatcher;
pub mod driver;
pub mod guards;
pub mod router;

pub use dispatcher::{validate_operation_name, OperationDispatcher, ScriptedDispatcher};
pub use driver::{Clock, TurnDriver, TurnReport};
pub use guards::RunawayGuard;
pub use router::route;
