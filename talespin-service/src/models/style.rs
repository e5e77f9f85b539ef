//! Narrative style catalog.
//!
//! Each [`VoiceStyle`] maps to a static [`StyleProfile`] carrying the
//! generation parameters and narration hints used when prompting, streaming
//! and falling back.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// A named narrative tone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceStyle {
    #[default]
    Storyteller,
    Adventure,
    Mystery,
    Comedy,
}

/// Static configuration for one style.
#[derive(Debug, Clone, Copy)]
pub struct StyleProfile {
    pub name: &'static str,
    pub description: &'static str,
    pub temperature: f32,
    pub max_output_tokens: i32,
    pub pacing: &'static str,
    pub guideline: &'static str,
    /// Delay between streamed chunks.
    pub chunk_delay: Duration,
    /// Used when a continuation cannot be generated.
    pub continuation_fallback: &'static str,
}

const STORYTELLER: StyleProfile = StyleProfile {
    name: "storyteller",
    description: "Warm, gentle narration suited to bedtime listening",
    temperature: 0.7,
    max_output_tokens: 300,
    pacing: "slow and soothing, with natural pauses",
    guideline: "Narrate like a kind grandparent by the fire: soft imagery, \
                gentle rhythm, and a comforting ending.",
    chunk_delay: Duration::from_millis(60),
    continuation_fallback: "And so the journey went on, softly and steadily, \
                            toward a morning full of new wonders.",
};

const ADVENTURE: StyleProfile = StyleProfile {
    name: "adventure",
    description: "Energetic, fast-moving tales of quests and daring",
    temperature: 0.9,
    max_output_tokens: 300,
    pacing: "brisk and punchy, building momentum",
    guideline: "Use vivid action verbs, short punchy sentences at the \
                climax, and a triumphant resolution.",
    chunk_delay: Duration::from_millis(30),
    continuation_fallback: "With hearts pounding, our heroes charged toward \
                            the next challenge, ready for whatever waited \
                            beyond the horizon.",
};

const MYSTERY: StyleProfile = StyleProfile {
    name: "mystery",
    description: "Suspenseful, atmospheric stories with a hint of the eerie",
    temperature: 0.8,
    max_output_tokens: 300,
    pacing: "measured and suspenseful, lingering on details",
    guideline: "Build tension slowly, plant one clue, use atmospheric \
                sounds and shadows, and end with a satisfying reveal.",
    chunk_delay: Duration::from_millis(90),
    continuation_fallback: "The shadows shifted once more, and somewhere in \
                            the silence a new clue was waiting to be found.",
};

const COMEDY: StyleProfile = StyleProfile {
    name: "comedy",
    description: "Playful, silly stories with comic timing",
    temperature: 0.95,
    max_output_tokens: 300,
    pacing: "lively and playful, with beats before punchlines",
    guideline: "Lean into absurd situations, playful wordplay, and a \
                punchline ending that lands well when spoken aloud.",
    chunk_delay: Duration::from_millis(45),
    continuation_fallback: "And just when everyone thought things could not \
                            get any sillier, they absolutely, spectacularly did.",
};

impl VoiceStyle {
    pub const ALL: [VoiceStyle; 4] = [
        VoiceStyle::Storyteller,
        VoiceStyle::Adventure,
        VoiceStyle::Mystery,
        VoiceStyle::Comedy,
    ];

    pub fn profile(self) -> &'static StyleProfile {
        match self {
            VoiceStyle::Storyteller => &STORYTELLER,
            VoiceStyle::Adventure => &ADVENTURE,
            VoiceStyle::Mystery => &MYSTERY,
            VoiceStyle::Comedy => &COMEDY,
        }
    }

    pub fn as_str(self) -> &'static str {
        self.profile().name
    }
}

impl fmt::Display for VoiceStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoiceStyle {
    type Err = std::convert::Infallible;

    /// Unknown tags resolve to the default style.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_ascii_lowercase();
        Ok(VoiceStyle::ALL
            .into_iter()
            .find(|style| style.as_str() == tag)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_and_unknown_tags() {
        assert_eq!("Mystery".parse::<VoiceStyle>().unwrap(), VoiceStyle::Mystery);
        assert_eq!(" comedy ".parse::<VoiceStyle>().unwrap(), VoiceStyle::Comedy);
        assert_eq!("opera".parse::<VoiceStyle>().unwrap(), VoiceStyle::Storyteller);
    }

    #[test]
    fn test_pacing_order() {
        let mystery = VoiceStyle::Mystery.profile().chunk_delay;
        let adventure = VoiceStyle::Adventure.profile().chunk_delay;
        for style in VoiceStyle::ALL {
            let delay = style.profile().chunk_delay;
            assert!(delay <= mystery);
            assert!(delay >= adventure);
        }
    }

    #[test]
    fn test_serializes_lowercase() {
        let json = serde_json::to_string(&VoiceStyle::Adventure).unwrap();
        assert_eq!(json, "\"adventure\"");
    }
}
