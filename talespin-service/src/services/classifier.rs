//! Keyword-based style and intent detection.
//!
//! Matching is done on lower-cased word sequences, so "more" matches
//! "tell me more" but not "moreover".

use crate::models::VoiceStyle;
use rand::seq::SliceRandom;
use rand::Rng;

/// Style keyword tables in priority order. The first table with a hit wins.
pub const STYLE_KEYWORDS: &[(VoiceStyle, &[&str])] = &[
    (
        VoiceStyle::Mystery,
        &[
            "scary", "spooky", "mystery", "mysterious", "haunted", "ghost", "ghosts", "creepy",
            "horror", "eerie", "detective", "suspense",
        ],
    ),
    (
        VoiceStyle::Comedy,
        &[
            "funny", "silly", "hilarious", "joke", "jokes", "laugh", "comedy", "humor", "humorous",
            "goofy",
        ],
    ),
    (
        VoiceStyle::Adventure,
        &[
            "adventure", "action", "exciting", "quest", "epic", "hero", "heroes", "battle",
            "explore", "journey",
        ],
    ),
    (
        VoiceStyle::Storyteller,
        &[
            "calm", "bedtime", "sleep", "sleepy", "gentle", "peaceful", "relaxing", "soothing",
            "cozy", "quiet",
        ],
    ),
];

/// Phrases signalling the caller wants the previous story to go on.
pub const CONTINUATION_KEYWORDS: &[&str] = &[
    "continue",
    "next",
    "what happens",
    "go on",
    "more",
    "and then",
];

/// Styles drawn from when neither keywords nor time of day decide.
const TIME_FALLBACK_STYLES: [VoiceStyle; 3] = [
    VoiceStyle::Storyteller,
    VoiceStyle::Adventure,
    VoiceStyle::Comedy,
];

/// Classify `input` into a catalog style. `hour` is the local hour (0-23)
/// used when no keyword matches.
pub fn detect_style<R: Rng + ?Sized>(input: &str, hour: u32, rng: &mut R) -> VoiceStyle {
    if let Some(style) = keyword_style(input) {
        return style;
    }

    match hour {
        5..=11 => VoiceStyle::Adventure,
        18..=23 => VoiceStyle::Storyteller,
        _ => TIME_FALLBACK_STYLES
            .choose(rng)
            .copied()
            .unwrap_or_default(),
    }
}

/// The style named by a keyword in `input`, if any.
pub fn keyword_style(input: &str) -> Option<VoiceStyle> {
    let words = words(input);
    STYLE_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| words.iter().any(|w| w == k)))
        .map(|(style, _)| *style)
}

/// True if `input` contains any continuation keyword.
pub fn wants_continuation(input: &str) -> bool {
    let words = words(input);
    CONTINUATION_KEYWORDS
        .iter()
        .any(|phrase| contains_phrase(&words, phrase))
}

/// Lower-cased alphanumeric words (apostrophes kept).
fn words(input: &str) -> Vec<String> {
    input
        .to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

fn contains_phrase(words: &[String], phrase: &str) -> bool {
    let needle: Vec<&str> = phrase.split_whitespace().collect();
    if needle.is_empty() || needle.len() > words.len() {
        return false;
    }
    words
        .windows(needle.len())
        .any(|window| window.iter().zip(&needle).all(|(w, n)| w == n))
}
