//! Per-user conversation state.

pub mod state;
pub mod store;
pub mod sweeper;

pub use state::{AddStep, EditStep, ExpenseDraft, Step, UserState};
pub use store::{MemorySessionStore, SessionStore};
pub use sweeper::spawn_sweeper;
