//! In-process session storage with time-based expiry.
//!
//! Every read-modify-write goes through a single `DashMap` entry operation,
//! which holds the shard lock for that key. Create-if-absent, append-with-cap
//! and the expiry sweep therefore never interleave on the same session.

use crate::models::{Session, VoiceStyle};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

/// Default session lifetime.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<DashMap<String, Session>>,
    ttl: chrono::Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL)
    }
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::hours(1)),
        }
    }

    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    /// Return the session for `id`, creating it if unseen.
    pub fn get_or_create(&self, id: &str) -> Session {
        self.get_or_create_at(id, Utc::now())
    }

    /// An expired session that has not been swept yet is replaced by a fresh
    /// one rather than served.
    pub fn get_or_create_at(&self, id: &str, now: DateTime<Utc>) -> Session {
        let mut entry = self
            .sessions
            .entry(id.to_string())
            .or_insert_with(|| Session::new(id, now));

        if entry.is_expired(now, self.ttl) {
            tracing::debug!(session_id = %id, "Replacing expired session");
            *entry = Session::new(id, now);
        }
        entry.clone()
    }

    /// Snapshot of a live session.
    pub fn get(&self, id: &str) -> Option<Session> {
        self.get_at(id, Utc::now())
    }

    pub fn get_at(&self, id: &str, now: DateTime<Utc>) -> Option<Session> {
        self.sessions
            .get(id)
            .filter(|s| !s.is_expired(now, self.ttl))
            .map(|s| s.clone())
    }

    /// The last story of a live session, if it has one.
    pub fn last_story(&self, id: &str) -> Option<String> {
        self.get(id)
            .filter(Session::has_story)
            .map(|s| s.last_story)
    }

    /// Store a generated story, creating the session if needed.
    pub fn record_story(&self, id: &str, topic: &str, story: &str, style: VoiceStyle) {
        self.record_story_at(id, topic, story, style, Utc::now())
    }

    pub fn record_story_at(
        &self,
        id: &str,
        topic: &str,
        story: &str,
        style: VoiceStyle,
        now: DateTime<Utc>,
    ) {
        let mut entry = self
            .sessions
            .entry(id.to_string())
            .or_insert_with(|| Session::new(id, now));

        if entry.is_expired(now, self.ttl) {
            *entry = Session::new(id, now);
        }
        entry.record_story(topic, story, style, now);
    }

    /// Remove every session older than the TTL. Returns how many were removed.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let mut removed = 0;
        self.sessions.retain(|_, session| {
            let keep = !session.is_expired(now, self.ttl);
            if !keep {
                removed += 1;
            }
            keep
        });

        if removed > 0 {
            tracing::info!(removed, remaining = self.sessions.len(), "Swept expired sessions");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
