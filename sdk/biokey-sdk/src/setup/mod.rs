pub mod orchestrator;
pub mod state;

pub use orchestrator::{SetupOptions, SetupOrchestrator, SetupOutcome};
pub use state::{InvalidTransition, SetupEvent, SetupState, StateMachine};
