//! Story production: new stories, continuations, and session bookkeeping.

use super::classifier::{detect_style, keyword_style, wants_continuation};
use super::fallback::{fallback_continuation, fallback_story};
use super::generation::GenerationClient;
use super::metrics;
use super::providers::GenerationParams;
use super::session_store::SessionStore;
use super::topic::extract_topic;
use crate::models::{Session, VoiceStyle};
use chrono::{Local, Timelike};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Sentences of the previous story given to the model as context.
const CONTEXT_SENTENCES: usize = 3;

const CONTINUATION_TEMPERATURE: f32 = 0.85;
const CONTINUATION_MAX_TOKENS: i32 = 200;
const TOP_P: f32 = 0.95;

/// Delivery hints mixed into new-story prompts, three at a time.
pub const AUDIO_TIPS: &[&str] = &[
    "Use short sentences that are easy to follow by ear.",
    "Create natural pauses with commas and ellipses.",
    "Include sound words the narrator can perform, like whoosh or creak.",
    "Give characters simple, distinct names that are easy to say.",
    "Avoid parentheses, lists, numbers and symbols.",
    "Repeat one key phrase for rhythm.",
    "Describe one vivid sound, smell or texture.",
    "End on a line that feels good to say aloud.",
];

/// Everything known about one produced story.
#[derive(Debug, Clone, PartialEq)]
pub struct StoryOutcome {
    pub story: String,
    pub style: VoiceStyle,
    pub topic: String,
    pub continuation: bool,
    /// False when the local fallback supplied the text.
    pub generated: bool,
}

#[derive(Clone)]
pub struct StoryOrchestrator {
    store: SessionStore,
    generator: GenerationClient,
}

impl StoryOrchestrator {
    pub fn new(store: SessionStore, generator: GenerationClient) -> Self {
        Self { store, generator }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn generator(&self) -> &GenerationClient {
        &self.generator
    }

    /// Produce a story for `user_text` within `session_id` and return it with
    /// its style.
    pub async fn produce(&self, user_text: &str, session_id: &str) -> (String, VoiceStyle) {
        let outcome = self.produce_story(user_text, session_id).await;
        (outcome.story, outcome.style)
    }

    pub async fn produce_story(&self, user_text: &str, session_id: &str) -> StoryOutcome {
        let mut rng = StdRng::from_entropy();
        self.produce_with(user_text, session_id, Local::now().hour(), &mut rng)
            .await
    }

    /// [`produce_story`](Self::produce_story) with explicit clock hour and
    /// random source.
    pub async fn produce_with<R: Rng + Send + ?Sized>(
        &self,
        user_text: &str,
        session_id: &str,
        hour: u32,
        rng: &mut R,
    ) -> StoryOutcome {
        let detected_style = detect_style(user_text, hour, rng);
        let topic = extract_topic(user_text, rng);

        // Continuation wins over a fresh command phrase in the same text.
        let previous = if wants_continuation(user_text) {
            self.store.get(session_id).filter(Session::has_story)
        } else {
            None
        };

        let outcome = match previous {
            Some(session) => {
                let style = keyword_style(user_text).unwrap_or(session.voice_style);
                let topic = session
                    .recent_entries
                    .back()
                    .map(|e| e.topic.clone())
                    .unwrap_or(topic);
                let (story, generated) = self
                    .continue_story(&session.last_story, user_text, style)
                    .await;
                StoryOutcome {
                    story,
                    style,
                    topic,
                    continuation: true,
                    generated,
                }
            }
            None => {
                let (story, generated) = self.new_story(&topic, detected_style, rng).await;
                StoryOutcome {
                    story,
                    style: detected_style,
                    topic,
                    continuation: false,
                    generated,
                }
            }
        };

        self.store
            .record_story(session_id, &outcome.topic, &outcome.story, outcome.style);

        metrics::record_story(outcome.style.as_str(), outcome.continuation, outcome.generated);
        metrics::set_sessions_active(self.store.len());

        tracing::info!(
            session_id = %session_id,
            style = %outcome.style,
            topic = %outcome.topic,
            continuation = outcome.continuation,
            fallback = !outcome.generated,
            "Story produced"
        );

        outcome
    }

    /// A new story outside any session.
    pub async fn compose<R: Rng + Send + ?Sized>(
        &self,
        user_text: &str,
        hour: u32,
        rng: &mut R,
    ) -> StoryOutcome {
        let style = detect_style(user_text, hour, rng);
        let topic = extract_topic(user_text, rng);
        let (story, generated) = self.new_story(&topic, style, rng).await;
        StoryOutcome {
            story,
            style,
            topic,
            continuation: false,
            generated,
        }
    }

    async fn new_story<R: Rng + Send + ?Sized>(
        &self,
        topic: &str,
        style: VoiceStyle,
        rng: &mut R,
    ) -> (String, bool) {
        let prompt = story_prompt(topic, style, rng);
        let profile = style.profile();
        let params = GenerationParams {
            temperature: Some(profile.temperature),
            top_p: Some(TOP_P),
            max_tokens: Some(profile.max_output_tokens),
        };

        match self.generator.generate(&prompt, &params).await {
            Some(story) => (story, true),
            None => (fallback_story(topic, style, rng), false),
        }
    }

    async fn continue_story(
        &self,
        last_story: &str,
        user_text: &str,
        style: VoiceStyle,
    ) -> (String, bool) {
        let prompt = continuation_prompt(last_story, user_text, style);
        let params = GenerationParams {
            temperature: Some(CONTINUATION_TEMPERATURE),
            top_p: Some(TOP_P),
            max_tokens: Some(CONTINUATION_MAX_TOKENS),
        };

        match self.generator.generate(&prompt, &params).await {
            Some(story) => (story, true),
            None => (fallback_continuation(style).to_string(), false),
        }
    }
}

pub fn story_prompt<R: Rng + ?Sized>(topic: &str, style: VoiceStyle, rng: &mut R) -> String {
    let profile = style.profile();
    let tips = AUDIO_TIPS
        .choose_multiple(rng, 3)
        .map(|tip| format!("- {}", tip))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are Talespin, a creative AI storyteller whose stories are read aloud \
         by a voice assistant. Write a unique, engaging short story (100-150 words) \
         about: {topic}\n\n\
         Style: {name} ({description})\n\
         Narration: {guideline}\n\
         Pacing: {pacing}\n\n\
         For audio delivery:\n{tips}\n\n\
         Give it a clear beginning, middle and end. Write plain spoken prose only, \
         with no title, headings or markdown.\n\n\
         Story:",
        topic = topic,
        name = profile.name,
        description = profile.description,
        guideline = profile.guideline,
        pacing = profile.pacing,
        tips = tips,
    )
}

pub fn continuation_prompt(last_story: &str, user_text: &str, style: VoiceStyle) -> String {
    let profile = style.profile();
    format!(
        "You are Talespin, continuing a story that is being read aloud by a voice \
         assistant.\n\n\
         The story so far ended with:\n\"{context}\"\n\n\
         The listener said: \"{request}\"\n\n\
         Continue the story in 60-100 words. Keep the same characters, setting and \
         {name} tone, and do not retell what already happened.\n\
         Narration: {guideline}\n\
         Write plain spoken prose only.\n\n\
         Continuation:",
        context = last_sentences(last_story, CONTEXT_SENTENCES),
        request = user_text.trim(),
        name = profile.name,
        guideline = profile.guideline,
    )
}

/// The final `n` sentences of `text`, or all of it when shorter.
pub fn last_sentences(text: &str, n: usize) -> String {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            let at_boundary = chars.peek().map_or(true, |(_, next)| next.is_whitespace());
            if at_boundary {
                let end = i + c.len_utf8();
                let sentence = text[start..end].trim();
                if !sentence.is_empty() {
                    sentences.push(sentence);
                }
                start = end;
            }
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }

    let skip = sentences.len().saturating_sub(n);
    sentences[skip..].join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fallback::tests::matches_any_template;
    use crate::services::providers::mock::{MockBehavior, MockTextProvider};
    use crate::services::providers::TextProvider;
    use crate::services::topic::DEFAULT_TOPICS;
    use std::sync::Arc;
    use std::time::Duration;

    fn orchestrator(provider: Option<Arc<MockTextProvider>>) -> StoryOrchestrator {
        let provider = provider.map(|p| p as Arc<dyn TextProvider>);
        StoryOrchestrator::new(
            SessionStore::default(),
            GenerationClient::new(provider, Duration::from_secs(1)),
        )
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(1)
    }

    #[test]
    fn test_last_sentences() {
        let story = "One. Two! Three? Four. Five";
        assert_eq!(last_sentences(story, 3), "Three? Four. Five");
        assert_eq!(last_sentences("Only one.", 3), "Only one.");
        assert_eq!(last_sentences("Dr.Who went home. Then slept.", 1), "Then slept.");
        assert_eq!(last_sentences("", 3), "");
    }

    #[test]
    fn test_story_prompt_contents() {
        let prompt = story_prompt("a haunted house", VoiceStyle::Mystery, &mut rng());
        assert!(prompt.contains("a haunted house"));
        assert!(prompt.contains(VoiceStyle::Mystery.profile().guideline));
        let tips = AUDIO_TIPS.iter().filter(|t| prompt.contains(*t)).count();
        assert_eq!(tips, 3);
    }

    #[tokio::test]
    async fn test_continuation_uses_fallback_sentence() {
        let orchestrator = orchestrator(Some(Arc::new(MockTextProvider::failing())));
        orchestrator.store().record_story(
            "s1",
            "a lighthouse",
            "The lamp went dark. A ship drifted close. Someone knocked.",
            VoiceStyle::Mystery,
        );

        let outcome = orchestrator
            .produce_with("what happens next?", "s1", 8, &mut rng())
            .await;

        assert!(outcome.continuation);
        assert!(!outcome.generated);
        assert_eq!(outcome.style, VoiceStyle::Mystery);
        assert_eq!(outcome.story, fallback_continuation(VoiceStyle::Mystery));
        assert_eq!(outcome.topic, "a lighthouse");

        let session = orchestrator.store().get("s1").unwrap();
        assert_eq!(session.last_story, outcome.story);
        assert_eq!(session.recent_entries.len(), 2);
    }

    #[tokio::test]
    async fn test_continuation_prompt_and_params() {
        let provider = Arc::new(MockTextProvider::responding("The knocking stopped."));
        let orchestrator = orchestrator(Some(provider.clone()));
        orchestrator.store().record_story(
            "s1",
            "a lighthouse",
            "First line. The lamp went dark. A ship drifted close. Someone knocked.",
            VoiceStyle::Storyteller,
        );

        let (story, style) = orchestrator.produce("go on", "s1").await;
        assert_eq!(story, "The knocking stopped.");
        assert_eq!(style, VoiceStyle::Storyteller);

        let prompt = provider.last_prompt().unwrap();
        assert!(prompt.contains("The lamp went dark. A ship drifted close. Someone knocked."));
        assert!(!prompt.contains("First line."));
        let params = provider.last_params().unwrap();
        assert_eq!(params.temperature, Some(CONTINUATION_TEMPERATURE));
        assert_eq!(params.max_tokens, Some(CONTINUATION_MAX_TOKENS));
        assert_eq!(
            orchestrator.store().last_story("s1").as_deref(),
            Some("The knocking stopped.")
        );
    }

    #[tokio::test]
    async fn test_continue_without_session_starts_new_story() {
        let orchestrator = orchestrator(None);

        let outcome = orchestrator
            .produce_with("continue", "fresh", 21, &mut rng())
            .await;

        assert!(!outcome.continuation);
        assert!(DEFAULT_TOPICS.contains(&outcome.topic.as_str()));
        assert_eq!(outcome.style, VoiceStyle::Storyteller);
        assert!(matches_any_template(outcome.style, &outcome.topic, &outcome.story));
        assert!(orchestrator.store().get("fresh").unwrap().has_story());
    }

    #[tokio::test]
    async fn test_continuation_beats_command_phrase() {
        let orchestrator = orchestrator(None);
        orchestrator
            .store()
            .record_story("s1", "owls", "An owl hooted.", VoiceStyle::Comedy);

        let outcome = orchestrator
            .produce_with("tell me a story about dragons and then more", "s1", 12, &mut rng())
            .await;

        assert!(outcome.continuation);
        assert_eq!(outcome.story, fallback_continuation(VoiceStyle::Comedy));
    }

    #[tokio::test]
    async fn test_space_pirates_fallback() {
        let provider = Arc::new(MockTextProvider::failing());
        let orchestrator = orchestrator(Some(provider.clone()));

        let outcome = orchestrator
            .produce_with("Tell me an adventure story about space pirates", "s2", 14, &mut rng())
            .await;

        assert_eq!(provider.calls(), 1);
        assert_eq!(outcome.style, VoiceStyle::Adventure);
        assert_eq!(outcome.topic, "space pirates");
        assert!(!outcome.generated);
        assert!(matches_any_template(VoiceStyle::Adventure, "space pirates", &outcome.story));
    }

    #[tokio::test]
    async fn test_new_story_uses_style_params() {
        let provider = Arc::new(MockTextProvider::new(MockBehavior::Echo));
        let orchestrator = orchestrator(Some(provider.clone()));

        let outcome = orchestrator
            .produce_with("a funny story about a goat", "s3", 12, &mut rng())
            .await;

        assert!(outcome.generated);
        assert_eq!(outcome.style, VoiceStyle::Comedy);
        assert!(outcome.story.starts_with("Mock story: "));
        assert!(outcome.story.contains("a goat"));
        let params = provider.last_params().unwrap();
        assert_eq!(params.temperature, Some(VoiceStyle::Comedy.profile().temperature));
    }

    #[tokio::test]
    async fn test_compose_leaves_sessions_untouched() {
        let orchestrator = orchestrator(None);
        let outcome = orchestrator.compose("robot artists", 9, &mut rng()).await;

        assert_eq!(outcome.topic, "robot artists");
        assert!(!outcome.story.is_empty());
        assert!(orchestrator.store().is_empty());
    }
}
