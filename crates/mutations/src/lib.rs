pub mod conformance;
mod error;
pub mod memory;
mod record;
mod traits;

pub use error::{MutationError, ASSIGNMENT_CHANGED};
pub use memory::{InMemoryMutations, MutationCall, Operation};
pub use record::{
    ContactStatus, MessageInput, OptOutInput, OptOutRecord, QuestionResponseInput, SendReceipt,
};
pub use texter_interchange::MessageRecord;
pub use traits::TexterMutations;
