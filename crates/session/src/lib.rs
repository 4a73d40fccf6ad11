//! texter-session: one texter working one contact.
//!
//! [`ContactSession`] owns the step tree, the response store and the draft
//! for a single contact, and hands mutating actions to a
//! [`SubmissionCoordinator`]. The coordinator runs each action as a
//! sequential pipeline of backend calls and converts every backend failure
//! into a [`SessionError`] through [`classify`].

mod classify;
mod coordinator;
mod error;
mod session;

pub use classify::classify;
pub use coordinator::{
    Action, CoordinatorState, Stage, SubmissionCoordinator, SubmitReport, Target,
};
pub use error::{Directive, Recovery, SessionError, GENERIC_FAILURE, EMPTY_MESSAGE};
pub use session::{ContactSession, Gate, SessionSettings, DEFAULT_OPT_OUT_SCRIPT};
