pub mod session;
pub mod style;

pub use session::{Session, StoryEntry, MAX_RECENT_ENTRIES};
pub use style::{StyleProfile, VoiceStyle};
