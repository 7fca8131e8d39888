pub mod coordinator;
pub mod message;
pub mod signature;

pub use coordinator::{SignedAction, SigningCoordinator};
pub use message::{action_message_hash, ActionDescriptor};
pub use signature::coerce_signature;
