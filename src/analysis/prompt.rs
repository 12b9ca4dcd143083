use serde_json::{json, Map, Value};

use crate::analysis::parser::{SENTINEL_KEY, SENTINEL_VALUE};
use crate::analysis::request::Language;
use crate::analysis::schema::{
    SchemaDescriptor, SchemaVersion, FIELD_ADVANCED_SUMMARY, FIELD_PARTNER_NAME,
    FIELD_RELATIONSHIP_STATUS, FIELD_SENTENCES, FIELD_SUMMARY, FIELD_TONE_INSIGHT,
    FIELD_TOTAL_SCORE, FIELD_WITTY_CONCLUSION, METRIC_DESCRIPTION, METRIC_SCORE,
    SUGGESTED_SENTENCE_COUNT,
};

pub const USER_INSTRUCTION: &str =
    "Analyze the conversation in this chat screenshot and reply with the JSON object described in the system instructions.";

const ROLE_PROMPT: &str = "You are a sharp, witty relationship coach who reads chat screenshots and explains the conversational dynamics between the user (\"me\", usually the right-hand bubbles) and the other person (\"partner\", usually the left-hand bubbles).";

const V1_RUBRIC: &str = "SCORING RUBRIC:\n\
1. Score each metric independently from 0 to 10 and justify it in one or two sentences.\n\
2. totalScore is the arithmetic mean of the five metric scores, rounded to the nearest integer.\n\
3. Base every judgement on what is visible in the screenshot; do not invent messages.";

const V2_RUBRIC: &str = "SCORING RUBRIC (non-linear):\n\
1. Score each radar dimension independently from 0 to 10 and justify it in one or two sentences.\n\
2. totalScore is NOT an average. Start from the strongest signal and apply ceilings:\n\
   - A purely transactional or logistical conversation (work, errands, scheduling with no personal tone) caps totalScore at 3, however polite it is.\n\
   - Without any exclusivity or disclosure signal, totalScore cannot exceed 6.\n\
   - Pet names, explicit compliments, invitations to meet alone or clear jealousy allow totalScore of 8 or higher.\n\
   - A high defense score pulls totalScore down even when other dimensions are strong.\n\
3. Base every judgement on what is visible in the screenshot; do not invent messages.";

const SENTINEL_RULE: &str = "If the image is not a screenshot of a chat conversation, or no messages can be read, reply with exactly this JSON and nothing else:";

fn sentence_example() -> Value {
    json!({
        "originalText": "the message exactly as written",
        "speaker": "me | partner",
        "hiddenMeaning": "what the sender is really signalling",
        "flirtScore": 7,
        "scoreReason": "why this line earns that score"
    })
}

/// Example object whose keys are exactly the fields the normalizer guarantees.
pub fn build_output_contract(descriptor: &SchemaDescriptor) -> Value {
    let mut metrics = Map::new();
    for metric in descriptor.metrics() {
        metrics.insert(
            metric.key.to_string(),
            json!({
                METRIC_SCORE: "number 0-10",
                METRIC_DESCRIPTION: format!("{}: {}", metric.label, metric.guidance),
            }),
        );
    }

    let mut contract = Map::new();
    contract.insert(
        FIELD_PARTNER_NAME.to_string(),
        json!("the partner's display name if visible (optional)"),
    );
    match descriptor.metric_group() {
        Some(group) => {
            contract.insert(group.to_string(), Value::Object(metrics));
        }
        None => contract.extend(metrics),
    }
    contract.insert(FIELD_TOTAL_SCORE.to_string(), json!("number 0-10"));
    contract.insert(
        FIELD_RELATIONSHIP_STATUS.to_string(),
        json!("a short label for the current relationship stage"),
    );
    contract.insert(
        FIELD_SUMMARY.to_string(),
        json!("two or three sentences on the overall dynamic"),
    );
    contract.insert(
        FIELD_TONE_INSIGHT.to_string(),
        json!("how each side's tone and word choice come across"),
    );
    contract.insert(
        FIELD_WITTY_CONCLUSION.to_string(),
        json!("a playful one-line verdict (optional)"),
    );
    contract.insert(FIELD_SENTENCES.to_string(), json!([sentence_example()]));
    contract.insert(
        FIELD_ADVANCED_SUMMARY.to_string(),
        json!("concrete advice on what to say or do next"),
    );
    Value::Object(contract)
}

fn rubric_for(version: SchemaVersion) -> &'static str {
    match version {
        SchemaVersion::V1 => V1_RUBRIC,
        SchemaVersion::V2 => V2_RUBRIC,
    }
}

fn render_metric_list(descriptor: &SchemaDescriptor) -> String {
    descriptor
        .metrics()
        .iter()
        .map(|metric| format!("- {} ({}): {}", metric.key, metric.label, metric.guidance))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_system_prompt(language: Language, descriptor: &SchemaDescriptor) -> String {
    let contract = build_output_contract(descriptor);
    let contract_text =
        serde_json::to_string_pretty(&contract).unwrap_or_else(|_| contract.to_string());
    let sentinel = json!({ SENTINEL_KEY: SENTINEL_VALUE }).to_string();
    let (min_sentences, max_sentences) = SUGGESTED_SENTENCE_COUNT;
    let metrics_heading = match descriptor.metric_group() {
        Some(group) => format!("METRICS (nested under \"{group}\"):"),
        None => "METRICS (top-level fields):".to_string(),
    };

    format!(
        "{role}\n\n\
{metrics_heading}\n{metric_list}\n\n\
{rubric}\n\n\
SENTENCES:\n\
Pick {min_sentences} to {max_sentences} of the most revealing messages, keep them in the order they appear in the conversation, and set speaker to \"me\" or \"partner\". flirtScore ranges from 1 to 10.\n\n\
LANGUAGE:\n\
Write every descriptive value in {language_name}. Keep JSON keys in English exactly as shown.\n\n\
{sentinel_rule}\n{sentinel}\n\n\
OUTPUT FORMAT:\n\
Reply with a single JSON object and no surrounding text, using exactly these keys:\n{contract_text}",
        role = ROLE_PROMPT,
        metric_list = render_metric_list(descriptor),
        rubric = rubric_for(descriptor.version),
        language_name = language.prompt_name(),
        sentinel_rule = SENTINEL_RULE,
    )
}
