//! Session model for story continuity.

use super::style::VoiceStyle;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Number of stories remembered per session.
pub const MAX_RECENT_ENTRIES: usize = 5;

/// Characters kept in an entry preview.
const PREVIEW_CHARS: usize = 100;

/// One ongoing story conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Caller-supplied or generated identifier.
    pub id: String,

    /// When the session was created. Never changes.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,

    /// Text of the most recently generated story.
    pub last_story: String,

    /// The most recent stories, oldest first.
    pub recent_entries: VecDeque<StoryEntry>,

    /// Last style used.
    pub voice_style: VoiceStyle,
}

/// A remembered story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryEntry {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub topic: String,
    pub preview: String,
}

impl Session {
    pub fn new(id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            created_at,
            last_story: String::new(),
            recent_entries: VecDeque::with_capacity(MAX_RECENT_ENTRIES),
            voice_style: VoiceStyle::default(),
        }
    }

    /// Record a generated story, evicting the oldest entry past capacity.
    pub fn record_story(
        &mut self,
        topic: &str,
        story: &str,
        style: VoiceStyle,
        now: DateTime<Utc>,
    ) {
        self.last_story = story.to_string();
        self.voice_style = style;

        if self.recent_entries.len() == MAX_RECENT_ENTRIES {
            self.recent_entries.pop_front();
        }
        self.recent_entries.push_back(StoryEntry {
            timestamp: now,
            topic: topic.to_string(),
            preview: preview(story),
        });
    }

    pub fn has_story(&self) -> bool {
        !self.last_story.trim().is_empty()
    }

    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.created_at > ttl
    }
}

fn preview(story: &str) -> String {
    let mut chars = story.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_story_caps_entries() {
        let now = Utc::now();
        let mut session = Session::new("s1", now);

        for i in 0..6 {
            session.record_story(&format!("topic {}", i), "A story.", VoiceStyle::Comedy, now);
        }

        assert_eq!(session.recent_entries.len(), MAX_RECENT_ENTRIES);
        let topics: Vec<_> = session.recent_entries.iter().map(|e| e.topic.as_str()).collect();
        assert_eq!(topics, ["topic 1", "topic 2", "topic 3", "topic 4", "topic 5"]);
        assert_eq!(session.voice_style, VoiceStyle::Comedy);
    }

    #[test]
    fn test_preview_truncates_long_stories() {
        let long = "x".repeat(250);
        let short = preview(&long);
        assert_eq!(short.chars().count(), PREVIEW_CHARS + 3);
        assert!(short.ends_with("..."));
        assert_eq!(preview("tiny"), "tiny");
    }

    #[test]
    fn test_expiry_is_strictly_after_ttl() {
        let created = Utc::now();
        let session = Session::new("s1", created);
        let ttl = Duration::hours(1);

        assert!(!session.is_expired(created + ttl, ttl));
        assert!(session.is_expired(created + ttl + Duration::seconds(1), ttl));
    }
}
