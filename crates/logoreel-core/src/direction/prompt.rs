//! System prompts for each phase of the creative-direction conversation.

use super::parser::{OPTIONS_MARKER, OPTION_LETTERS};
use super::phase::{Phase, PhaseKind};

/// What the user told us about their brand when the session started.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrandBrief {
    pub name: String,
    pub description: Option<String>,
}

const ROLE_PREAMBLE: &str = "You are a senior motion designer helping a client plan a short animated \
version of their logo. Be warm, concrete and brief.";

/// Topic each clarification phase should settle, indexed by phase number - 1.
const CLARIFICATION_TOPICS: [&str; 4] = [
    "the personality and mood the animation should convey",
    "the motion style (for example smooth reveals, kinetic typography, playful bounces)",
    "colour treatment, background and any supporting visual elements",
    "where the animation will be used, its target length and whether it needs sound",
];

/// Render the system prompt for `phase`.
pub fn system_prompt(phase: Phase, brand: &BrandBrief) -> String {
    let mut prompt = String::with_capacity(1024);
    prompt.push_str(ROLE_PREAMBLE);
    prompt.push_str("\n\n");
    prompt.push_str(&brand_context(brand));
    prompt.push_str("\n\n");

    match phase.kind() {
        PhaseKind::Clarification => {
            let topic = CLARIFICATION_TOPICS[usize::from(phase.number() - 1)];
            prompt.push_str(&format!(
                "This is question {} of {}. Ask exactly one question about {topic}.\n\
                 Keep the question under 40 words, then write a line containing only \
                 `{OPTIONS_MARKER}` followed by three to {max} options, one per line, \
                 formatted as `<letter>. <option>` using the letters {first}-{last}. \
                 Make the last option \"Something else (describe it)\".\n\
                 Do not add anything after the options.",
                phase.number(),
                Phase::GENERATION.number() - 1,
                max = OPTION_LETTERS.count(),
                first = OPTION_LETTERS.start(),
                last = OPTION_LETTERS.end(),
            ));
        }
        PhaseKind::Generation => {
            prompt.push_str(
                "The clarifying questions are finished. Using every answer in the conversation, \
                 write the final creative direction for the logo animation: a one-sentence \
                 concept, then a numbered shot list with timings, then the colour and motion \
                 notes an animator needs. Do not ask further questions and do not include an \
                 options list.",
            );
        }
    }

    prompt
}

fn brand_context(brand: &BrandBrief) -> String {
    match brand.description.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        Some(description) => format!("The brand is \"{}\": {description}", brand.name.trim()),
        None => format!("The brand is \"{}\".", brand.name.trim()),
    }
}
