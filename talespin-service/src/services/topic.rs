//! Story subject extraction.

use super::classifier::CONTINUATION_KEYWORDS;
use rand::seq::SliceRandom;
use rand::Rng;

/// Command phrases, most specific first. The text after the first phrase
/// found becomes the subject.
pub const COMMAND_PHRASES: &[&str] = &[
    "tell me a story about",
    "tell me a story of",
    "give me a story about",
    "give me a story of",
    "tell me a tale about",
    "i want a story about",
    "can you tell me a story about",
    "write a story about",
    "a story about",
    "story about",
    "a story of",
    "story of",
    "tale about",
    "tell me a story",
    "give me a story",
    "tell me about",
    "a story",
    "story",
];

/// Residual subjects that carry no meaning on their own.
const STOP_SUBJECTS: &[&str] = &["", "unique", "something", "anything", "a story", "story"];

/// Drawn when the caller gave no usable subject.
pub const DEFAULT_TOPICS: &[&str] = &[
    "a lighthouse keeper who collects lost songs",
    "a dragon learning to bake bread",
    "a clockwork fox in a snowy forest",
    "space pirates searching for a singing comet",
    "a library where the books whisper at night",
    "a robot artist painting its first sunrise",
    "a tiny village built on the back of a whale",
    "a detective cat solving the case of the missing moon",
];

const MIN_TOPIC_CHARS: usize = 3;

/// Strip command phrasing from `input`, falling back to a random creative
/// topic. Never returns fewer than three characters.
pub fn extract_topic<R: Rng + ?Sized>(input: &str, rng: &mut R) -> String {
    let lowered = input.to_lowercase();
    let lowered = lowered.trim();

    let residual = COMMAND_PHRASES
        .iter()
        .find_map(|phrase| find_phrase(lowered, phrase).map(|at| &lowered[at + phrase.len()..]))
        .unwrap_or(lowered);

    let subject = clean_residual(residual);

    if subject.chars().count() < MIN_TOPIC_CHARS || is_stop_subject(&subject) {
        return random_topic(rng);
    }
    subject
}

pub fn random_topic<R: Rng + ?Sized>(rng: &mut R) -> String {
    DEFAULT_TOPICS
        .choose(rng)
        .copied()
        .unwrap_or("an adventure")
        .to_string()
}

/// Byte offset of `phrase` in `text`, only where it starts on a word boundary
/// and ends on one ("history of" does not contain "story of", "storyline"
/// does not contain "story").
fn find_phrase(text: &str, phrase: &str) -> Option<usize> {
    text.match_indices(phrase).map(|(at, _)| at).find(|&at| {
        let starts = text[..at]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let ends = text[at + phrase.len()..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric());
        starts && ends
    })
}

fn clean_residual(residual: &str) -> String {
    let mut subject = residual
        .trim()
        .trim_end_matches(|c: char| matches!(c, '.' | '!' | '?' | ',' | ';' | ':'))
        .trim()
        .to_string();

    // Trailing politeness and leading connectors, repeatedly.
    loop {
        let before = subject.len();
        for suffix in ["please", "for me", "now"] {
            if let Some(rest) = subject.strip_suffix(suffix) {
                if rest.is_empty() || rest.ends_with(' ') || rest.ends_with(',') {
                    subject = rest.trim_end_matches([' ', ',']).to_string();
                }
            }
        }
        for prefix in ["about ", "of ", "on ", ": ", "- "] {
            if let Some(rest) = subject.strip_prefix(prefix) {
                subject = rest.trim_start().to_string();
            }
        }
        subject = subject
            .trim_end_matches(|c: char| matches!(c, '.' | '!' | '?' | ',' | ';' | ':'))
            .trim()
            .to_string();
        if subject.len() == before {
            return subject;
        }
    }
}

fn is_stop_subject(subject: &str) -> bool {
    STOP_SUBJECTS.contains(&subject) || CONTINUATION_KEYWORDS.contains(&subject)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn test_haunted_house() {
        assert_eq!(
            extract_topic("Tell me a scary story about a haunted house", &mut rng()),
            "a haunted house"
        );
    }

    #[test]
    fn test_strips_command_and_politeness() {
        assert_eq!(
            extract_topic("Tell me a story about space pirates, please.", &mut rng()),
            "space pirates"
        );
        assert_eq!(
            extract_topic("give me a story of a brave snail!", &mut rng()),
            "a brave snail"
        );
        assert_eq!(extract_topic("Robot artists", &mut rng()), "robot artists");
        assert_eq!(
            extract_topic("the history of rome", &mut rng()),
            "the history of rome"
        );
        assert_eq!(
            extract_topic("a storyline with dragons", &mut rng()),
            "a storyline with dragons"
        );
        assert_eq!(
            extract_topic("Tell me a storybook tale about owls", &mut rng()),
            "owls"
        );
    }

    #[test]
    fn test_stop_subjects_use_defaults() {
        for input in ["tell me a story", "Tell me a unique story", "story about something", "continue", "go on", "", "  ", "hi"] {
            let topic = extract_topic(input, &mut rng());
            assert!(DEFAULT_TOPICS.contains(&topic.as_str()), "{:?} -> {:?}", input, topic);
        }
    }

    #[test]
    fn test_same_seed_same_default() {
        let a = extract_topic("", &mut StdRng::seed_from_u64(9));
        let b = extract_topic("", &mut StdRng::seed_from_u64(9));
        assert_eq!(a, b);
    }

    #[test]
    fn test_never_shorter_than_three_chars() {
        let mut rng = rng();
        let inputs = [
            "", "a", "ab", "story about x", "story about ..", "tell me a story please",
            "story of me", "  story   ", "!!!", "tell me about it",
        ];
        for input in inputs {
            let topic = extract_topic(input, &mut rng);
            assert!(topic.chars().count() >= 3, "{:?} -> {:?}", input, topic);
            assert!(!topic.trim().is_empty());
        }
    }
}
