//! texter-core: the branching interaction-step engine.
//!
//! A campaign supplies, per contact, a tree of interaction steps. Each step
//! carries a script template and optionally a survey question whose answer
//! options point forward to follow-up steps. The engine is synchronous and
//! pure apart from the [`ResponseStore`] the caller owns:
//!
//! - [`StepTree`] -- validated node table with children-by-parent index
//! - [`render`] -- placeholder substitution against a [`ScriptContext`]
//! - [`ResponseStore`] -- step id to chosen answer, seeded from persistence
//! - [`resolve_available_steps`] -- the currently reachable path from the root
//! - [`apply_answer`] -- record an answer and clear stale direct-child answers

pub mod editor;
pub mod error;
pub mod path;
pub mod responses;
pub mod script;
pub mod tree;

pub use editor::{apply_answer, AnswerOutcome};
pub use error::{EdgeKind, TreeError};
pub use path::{current_step, resolve_available_steps};
pub use responses::{Partition, ResponseStore};
pub use script::{placeholders, render, render_str, ScriptContext};
pub use tree::{AnswerOption, InteractionStep, Question, StepTree};
