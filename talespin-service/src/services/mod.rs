pub mod classifier;
pub mod fallback;
pub mod generation;
pub mod metrics;
pub mod orchestrator;
pub mod providers;
pub mod session_store;
pub mod topic;

pub use generation::GenerationClient;
pub use orchestrator::{StoryOrchestrator, StoryOutcome};
pub use session_store::SessionStore;
