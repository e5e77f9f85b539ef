//! Offline story synthesis used when generation is unavailable.
//!
//! Templates are plain strings with two kinds of slots:
//! `{topic}` is replaced by the story subject verbatim, and `{a|b|c}` is
//! resolved to one of its alternatives uniformly at random.

use crate::models::VoiceStyle;
use rand::seq::SliceRandom;
use rand::Rng;

const STORYTELLER_TEMPLATES: &[&str] = &[
    "Once upon a time, in a {quiet valley|village by the sea|cottage at the edge of the woods}, \
     there lived {topic}. Every evening, {the stars leaned closer to listen|the wind hummed a lullaby|\
     the fireflies gathered like tiny lanterns}. And when the night grew deep, {topic} learned that \
     {kindness is the softest kind of magic|home is wherever someone waits for you|even small hearts \
     can hold the whole sky}.",
    "Long ago, when the moon was still learning to glow, {topic} set out on {a gentle journey|a slow \
     walk through silver meadows|a quiet voyage down a sleepy river}. Along the way, \
     {an old owl|a friendly badger|a wandering cloud} shared a secret about dreams. By morning, \
     everyone agreed it was {the most peaceful night|the sweetest adventure|a story worth telling again}.",
    "In a land of {soft hills|whispering pines|warm lantern light}, the tale of {topic} was told to \
     every child at bedtime. It spoke of {patience|courage|friendship} and of promises kept. \
     {And so the story rests, until tomorrow.|Close your eyes, and it will visit you in dreams.}",
];

const ADVENTURE_TEMPLATES: &[&str] = &[
    "The moment the {alarm bells rang|storm broke|map began to glow}, {topic} knew the quest had \
     begun. Racing across {jagged cliffs|a collapsing bridge|an endless desert}, they faced \
     {a roaring sky-beast|a rival crew of treasure hunters|a maze that rearranged itself}. With one \
     daring leap, {topic} {claimed the prize|saved the day|found a path no one had dared to take}!",
    "Legends warned that no one returned from {the Crimson Peaks|the Sunken City|the edge of the \
     world}, but {topic} charged ahead anyway. {Ropes snapped|Engines roared|Thunder cracked} as the \
     final challenge appeared. Heart pounding, {topic} {stood tall and won|outsmarted the danger|\
     turned fear into fuel}, and the adventure became legend.",
    "Dawn had barely broken when {topic} {grabbed a compass|unfurled the sails|strapped on a \
     jetpack} and set off. {Danger waited around every corner|The ground shook with every step|\
     Allies appeared just in time}. By sunset, {topic} had {discovered a hidden kingdom|rescued a \
     lost friend|proven that courage beats any obstacle}.",
];

const MYSTERY_TEMPLATES: &[&str] = &[
    "No one in town could explain {topic}. Each night, {a lantern flickered in an empty window|\
     footsteps echoed where no one walked|a cold whisper drifted through the hallway}. When at last \
     someone dared to look closer, they found {a single muddy footprint|a letter dated one hundred \
     years ago|a door that had not been there before}. {Some secrets prefer to stay hidden.|The \
     mystery, it seemed, was only beginning.}",
    "The fog rolled in thick the evening {topic} was first noticed. {The clock tower struck \
     thirteen|The crows fell silent|Every candle dimmed at once}, and a detective with {tired eyes|\
     a crooked hat|a silver magnifying glass} began to ask questions. The answer was hiding in \
     plain sight: {the portrait's eyes had moved|the key was never lost|the guest list had one name \
     too many}.",
    "They say {topic} still waits behind the {creaking gate|old stone well|locked attic door}. \
     Those who listen closely hear {a faint melody|scratching from within|their own name, softly \
     spoken}. {Nobody has solved it yet.|Perhaps you will be the one to find out why.}",
];

const COMEDY_TEMPLATES: &[&str] = &[
    "Nobody expected {topic} to {enter a baking contest|run for mayor|start a rock band}, least of \
     all {the grumpy neighbor|a very confused goat|the local pigeons}. Things went wrong almost \
     immediately when {the cake exploded|the microphone turned into a banana|everyone forgot the \
     words}. Somehow, {topic} still won first prize, mostly for enthusiasm.",
    "It was a perfectly normal Tuesday until {topic} {sneezed so hard the town clock reset|\
     accidentally adopted forty-seven ducks|tried to iron a waffle}. {Chaos followed|The mayor \
     fainted|The ducks unionized}. In the end, everyone agreed it was {the best mistake ever|\
     surprisingly delicious|absolutely going in the newsletter}.",
    "{topic} had one simple job: {water the plants|walk the dog|deliver a sandwich}. Unfortunately, \
     {the plants had opinions|the dog had other plans|the sandwich was extremely slippery}. \
     {Hilarity ensued.|Nobody has recovered since.|It is still the funniest story in town.}",
];

/// One piece of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Literal(&'a str),
    Topic,
    Choice(Vec<&'a str>),
}

pub fn templates_for(style: VoiceStyle) -> &'static [&'static str] {
    match style {
        VoiceStyle::Storyteller => STORYTELLER_TEMPLATES,
        VoiceStyle::Adventure => ADVENTURE_TEMPLATES,
        VoiceStyle::Mystery => MYSTERY_TEMPLATES,
        VoiceStyle::Comedy => COMEDY_TEMPLATES,
    }
}

/// Build a short story about `topic` in the given style. Never fails and
/// never touches the network.
pub fn fallback_story<R: Rng + ?Sized>(topic: &str, style: VoiceStyle, rng: &mut R) -> String {
    let template = templates_for(style)
        .choose(rng)
        .or_else(|| templates_for(VoiceStyle::default()).first())
        .copied()
        .unwrap_or("Once upon a time, there was {topic}. It was a wonderful story.");

    render(template, topic, rng)
}

/// The fixed sentence used when a continuation cannot be generated.
pub fn fallback_continuation(style: VoiceStyle) -> &'static str {
    style.profile().continuation_fallback
}

pub fn render<R: Rng + ?Sized>(template: &str, topic: &str, rng: &mut R) -> String {
    let mut out = String::with_capacity(template.len() + topic.len() * 2);
    for segment in parse_template(template) {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Topic => out.push_str(topic),
            Segment::Choice(options) => {
                out.push_str(options.choose(rng).copied().unwrap_or_default())
            }
        }
    }
    capitalize_first(&out)
}

/// Split a template into literal, topic and choice segments. An unmatched
/// `{` is kept as literal text.
pub fn parse_template(template: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}').map(|c| open + c) else {
            break;
        };
        if open > 0 {
            segments.push(Segment::Literal(&rest[..open]));
        }
        let slot = &rest[open + 1..close];
        if slot == "topic" {
            segments.push(Segment::Topic);
        } else {
            segments.push(Segment::Choice(slot.split('|').collect()));
        }
        rest = &rest[close + 1..];
    }

    if !rest.is_empty() {
        segments.push(Segment::Literal(rest));
    }
    segments
}

fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
