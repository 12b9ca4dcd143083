use serde_json::{Map, Value};

use crate::analysis::parser::PREVIEW_CHAR_LIMIT;
use crate::analysis::result::{AnalysisResult, Speaker};
use crate::analysis::schema::{
    score_value, FieldKind, SchemaDescriptor, FIELD_SENTENCES, FLIRT_SCORE_RANGE,
    METRIC_DESCRIPTION, METRIC_SCORE, PLACEHOLDER_DESCRIPTION, PLACEHOLDER_TEXT, SCORE_RANGE,
};
use crate::utils::text::truncate_for_log;

const SENTENCE_TEXT_FIELDS: [&str; 3] = ["originalText", "hiddenMeaning", "scoreReason"];
const SENTENCE_SPEAKER: &str = "speaker";
const SENTENCE_FLIRT_SCORE: &str = "flirtScore";

#[derive(Debug, Clone)]
pub struct Normalized {
    pub result: AnalysisResult,
    /// One entry per coercion applied, as `path: what happened`.
    pub warnings: Vec<String>,
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Model text quoted in a warning, bounded like other logged model output.
fn quoted(text: &str) -> String {
    format!("{:?}", truncate_for_log(text, PREVIEW_CHAR_LIMIT))
}

struct Normalizer<'a> {
    descriptor: &'a SchemaDescriptor,
    warnings: Vec<String>,
}

impl<'a> Normalizer<'a> {
    fn warn(&mut self, path: &str, detail: impl AsRef<str>) {
        self.warnings.push(format!("{path}: {}", detail.as_ref()));
    }

    fn clamp(&mut self, path: &str, number: f64, original: Value, (min, max): (f64, f64)) -> Value {
        if number < min {
            self.warn(path, format!("{number} below {min}, clamped"));
            score_value(min)
        } else if number > max {
            self.warn(path, format!("{number} above {max}, clamped"));
            score_value(max)
        } else {
            original
        }
    }

    fn score(&mut self, path: &str, slot: Option<Value>, range: (f64, f64), default: f64) -> Value {
        match slot {
            Some(Value::Number(number)) => {
                let as_f64 = number.as_f64().unwrap_or(default);
                self.clamp(path, as_f64, Value::Number(number), range)
            }
            Some(Value::String(text)) => match text.trim().parse::<f64>() {
                Ok(parsed) if parsed.is_finite() => {
                    self.warn(path, format!("numeric string {} converted", quoted(&text)));
                    self.clamp(path, parsed, score_value(parsed), range)
                }
                _ => {
                    self.warn(path, format!("non-numeric string {}, defaulted", quoted(&text)));
                    score_value(default)
                }
            },
            Some(other) => {
                self.warn(path, format!("expected a number, got {}, defaulted", describe(&other)));
                score_value(default)
            }
            None => {
                self.warn(path, "missing, defaulted");
                score_value(default)
            }
        }
    }

    fn text(&mut self, path: &str, slot: Option<Value>, placeholder: &str) -> Value {
        match slot {
            Some(Value::String(text)) if !text.trim().is_empty() => Value::String(text),
            Some(Value::String(_)) => {
                self.warn(path, "blank, defaulted");
                Value::String(placeholder.to_string())
            }
            Some(other) => {
                self.warn(path, format!("expected a string, got {}, defaulted", describe(&other)));
                Value::String(placeholder.to_string())
            }
            None => {
                self.warn(path, "missing, defaulted");
                Value::String(placeholder.to_string())
            }
        }
    }

    fn metric(&mut self, path: &str, slot: Option<Value>) -> Value {
        let mut entry = match slot {
            Some(Value::Object(entry)) => entry,
            Some(other) => {
                self.warn(path, format!("expected an object, got {}, defaulted", describe(&other)));
                return self.descriptor.default_metric();
            }
            None => {
                self.warn(path, "missing, defaulted");
                return self.descriptor.default_metric();
            }
        };

        let score = self.score(
            &format!("{path}.{METRIC_SCORE}"),
            entry.remove(METRIC_SCORE),
            SCORE_RANGE,
            0.0,
        );
        let description = self.text(
            &format!("{path}.{METRIC_DESCRIPTION}"),
            entry.remove(METRIC_DESCRIPTION),
            PLACEHOLDER_DESCRIPTION,
        );
        entry.insert(METRIC_SCORE.to_string(), score);
        entry.insert(METRIC_DESCRIPTION.to_string(), description);
        Value::Object(entry)
    }

    fn metric_group(&mut self, group: &str, slot: Option<Value>) -> Value {
        let mut grouped = match slot {
            Some(Value::Object(grouped)) => grouped,
            Some(other) => {
                self.warn(group, format!("expected an object, got {}, rebuilt", describe(&other)));
                Map::new()
            }
            None => {
                self.warn(group, "missing, rebuilt");
                Map::new()
            }
        };
        let descriptor = self.descriptor;
        for key in descriptor.metric_keys() {
            let metric = self.metric(&format!("{group}.{key}"), grouped.remove(key));
            grouped.insert(key.to_string(), metric);
        }
        Value::Object(grouped)
    }

    fn speaker(&mut self, path: &str, slot: Option<Value>) -> Value {
        let fallback = Speaker::Partner.as_str();
        match slot {
            Some(Value::String(text)) => match Speaker::parse(&text) {
                Some(speaker) if speaker.as_str() == text => Value::String(text),
                Some(speaker) => {
                    self.warn(path, format!("{} normalized to {:?}", quoted(&text), speaker.as_str()));
                    Value::String(speaker.as_str().to_string())
                }
                None => {
                    self.warn(path, format!("unknown speaker {}, defaulted to {fallback:?}", quoted(&text)));
                    Value::String(fallback.to_string())
                }
            },
            Some(other) => {
                self.warn(path, format!("expected a string, got {}, defaulted", describe(&other)));
                Value::String(fallback.to_string())
            }
            None => {
                self.warn(path, "missing, defaulted");
                Value::String(fallback.to_string())
            }
        }
    }

    fn sentence(&mut self, path: &str, mut entry: Map<String, Value>) -> Value {
        for field in SENTENCE_TEXT_FIELDS {
            let value = self.text(&format!("{path}.{field}"), entry.remove(field), PLACEHOLDER_TEXT);
            entry.insert(field.to_string(), value);
        }
        let speaker = self.speaker(
            &format!("{path}.{SENTENCE_SPEAKER}"),
            entry.remove(SENTENCE_SPEAKER),
        );
        entry.insert(SENTENCE_SPEAKER.to_string(), speaker);
        let flirt_score = self.score(
            &format!("{path}.{SENTENCE_FLIRT_SCORE}"),
            entry.remove(SENTENCE_FLIRT_SCORE),
            FLIRT_SCORE_RANGE,
            FLIRT_SCORE_RANGE.0,
        );
        entry.insert(SENTENCE_FLIRT_SCORE.to_string(), flirt_score);
        Value::Object(entry)
    }

    fn sentences(&mut self, slot: Option<Value>) -> Value {
        let items = match slot {
            Some(Value::Array(items)) => items,
            Some(other) => {
                self.warn(
                    FIELD_SENTENCES,
                    format!("expected an array, got {}, replaced with []", describe(&other)),
                );
                return self.descriptor.default_for(FIELD_SENTENCES);
            }
            None => {
                self.warn(FIELD_SENTENCES, "missing, replaced with []");
                return self.descriptor.default_for(FIELD_SENTENCES);
            }
        };

        let mut kept = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            let path = format!("{FIELD_SENTENCES}[{index}]");
            match item {
                Value::Object(entry) => kept.push(self.sentence(&path, entry)),
                other => self.warn(
                    &path,
                    format!("expected an object, got {}, dropped", describe(&other)),
                ),
            }
        }
        Value::Array(kept)
    }

    fn optional_text(&mut self, fields: &mut Map<String, Value>, field: &str) {
        match fields.get(field) {
            None => {}
            Some(Value::String(text)) if !text.trim().is_empty() => {}
            Some(other) => {
                let kind = describe(other);
                fields.remove(field);
                self.warn(field, format!("optional field was {kind} or blank, removed"));
            }
        }
    }
}

/// Coerces a parsed model object into the shape `descriptor` promises.
/// Unknown extra fields pass through untouched.
pub fn normalize(descriptor: &SchemaDescriptor, mut fields: Map<String, Value>) -> Normalized {
    let mut normalizer = Normalizer {
        descriptor,
        warnings: Vec::new(),
    };

    for field in descriptor.required_fields() {
        let Some(kind) = descriptor.field_kind(field) else {
            continue;
        };
        let slot = fields.remove(field);
        let value = match kind {
            FieldKind::MetricGroup => normalizer.metric_group(field, slot),
            FieldKind::Metric => normalizer.metric(field, slot),
            FieldKind::Score { range, default } => normalizer.score(field, slot, range, default),
            FieldKind::Text { placeholder } => normalizer.text(field, slot, placeholder),
            FieldKind::Sentences => normalizer.sentences(slot),
        };
        fields.insert(field.to_string(), value);
    }

    for field in descriptor.optional_fields() {
        normalizer.optional_text(&mut fields, field);
    }

    Normalized {
        result: AnalysisResult::from_normalized(fields),
        warnings: normalizer.warnings,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::analysis::schema::{SchemaVersion, FIELD_TOTAL_SCORE};

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("test fixture must be an object")
    }

    fn sentence(text: &str, speaker: &str, score: i64) -> Value {
        json!({
            "originalText": text,
            "speaker": speaker,
            "hiddenMeaning": "想多聊一點",
            "flirtScore": score,
            "scoreReason": "主動延續話題"
        })
    }

    fn full_v2() -> Value {
        json!({
            "partnerName": "小美",
            "radar": {
                "tension": { "score": 7, "description": "有來有往" },
                "disclosure": { "score": 6, "description": "分享了加班心情" },
                "momentum": { "score": 8, "description": "主動約週末" },
                "exclusivity": { "score": 5, "description": "出現內部梗" },
                "baiting": { "score": 9, "description": "頻繁拋話題" },
                "defense": { "score": 2, "description": "幾乎沒有迴避" }
            },
            "totalScore": 8,
            "relationshipStatus": "曖昧升溫中",
            "summary": "雙方互動熱絡",
            "toneInsight": "語氣輕鬆",
            "wittyConclusion": "再不約就要被搶走了",
            "sentences": [
                sentence("今天好累喔", "partner", 6),
                sentence("要不要我幫你按摩", "me", 8),
                sentence("你說的喔", "partner", 9),
                sentence("週末有空嗎", "me", 7),
                sentence("看你表現", "partner", 8)
            ],
            "advancedSummary": "可以直接提出見面邀約"
        })
    }

    fn assert_complete(descriptor: &SchemaDescriptor, result: &AnalysisResult) {
        let map = result.as_map();
        for field in descriptor.required_fields() {
            assert!(map.contains_key(field), "missing required field {field}");
        }
        for key in descriptor.metric_keys() {
            let metric = result.metric(key).unwrap_or_else(|| panic!("metric {key} not typed"));
            assert!(!metric.description.is_empty());
            assert!((0.0..=10.0).contains(&metric.score));
        }
        assert!(map[FIELD_SENTENCES].is_array());
        assert!(map[FIELD_TOTAL_SCORE].is_number());
    }

    #[test]
    fn fully_valid_v2_round_trips_unchanged() {
        let descriptor = SchemaVersion::V2.descriptor();
        let input = full_v2();
        let normalized = normalize(descriptor, object(input.clone()));
        assert!(normalized.warnings.is_empty(), "{:?}", normalized.warnings);
        assert_eq!(normalized.result.into_value(), input);
    }

    #[test]
    fn missing_defense_metric_is_filled_with_default() {
        let descriptor = SchemaVersion::V2.descriptor();
        let mut input = full_v2();
        input["radar"].as_object_mut().unwrap().remove("defense");

        let normalized = normalize(descriptor, object(input));
        let defense = normalized.result.metric("defense").unwrap();
        assert_eq!(defense.score, 0.0);
        assert_eq!(defense.description, PLACEHOLDER_DESCRIPTION);
        assert_eq!(normalized.warnings, vec!["radar.defense: missing, defaulted"]);
        assert_eq!(normalized.result.metric("tension").unwrap().score, 7.0);
    }

    #[test]
    fn empty_object_gets_every_required_field() {
        for version in [SchemaVersion::V1, SchemaVersion::V2] {
            let descriptor = version.descriptor();
            let normalized = normalize(descriptor, Map::new());
            assert_complete(descriptor, &normalized.result);
            assert_eq!(normalized.result.sentence_count(), 0);
            assert!(!normalized.warnings.is_empty());
            assert!(normalized.result.text("wittyConclusion").is_none());
            assert!(normalized.result.text("partnerName").is_none());
        }
    }

    #[test]
    fn wrong_types_are_coerced_not_rejected() {
        let descriptor = SchemaVersion::V1.descriptor();
        let input = json!({
            "emotional": { "score": "7", "description": 42 },
            "intimacy": "very high",
            "playfulness": { "score": 15, "description": "" },
            "responsive": { "score": -3, "description": "慢" },
            "balance": null,
            "totalScore": "eight",
            "relationshipStatus": ["朋友"],
            "summary": "",
            "toneInsight": true,
            "wittyConclusion": 3,
            "sentences": { "originalText": "hi" },
            "advancedSummary": "多問問題"
        });

        let normalized = normalize(descriptor, object(input));
        let result = &normalized.result;
        assert_complete(descriptor, result);

        assert_eq!(result.metric("emotional").unwrap().score, 7.0);
        assert_eq!(
            result.metric("emotional").unwrap().description,
            PLACEHOLDER_DESCRIPTION
        );
        assert_eq!(result.metric("intimacy").unwrap().score, 0.0);
        assert_eq!(result.metric("playfulness").unwrap().score, 10.0);
        assert_eq!(result.metric("responsive").unwrap().score, 0.0);
        assert_eq!(result.metric("responsive").unwrap().description, "慢");
        assert_eq!(result.total_score(), 0.0);
        assert_eq!(result.text("relationshipStatus"), Some(PLACEHOLDER_TEXT));
        assert_eq!(result.text("summary"), Some(PLACEHOLDER_TEXT));
        assert_eq!(result.text("advancedSummary"), Some("多問問題"));
        assert!(result.as_map().get("wittyConclusion").is_none());
        assert_eq!(result.as_map()[FIELD_SENTENCES], json!([]));
    }

    #[test]
    fn sentences_keep_order_and_are_repaired_in_place() {
        let descriptor = SchemaVersion::V2.descriptor();
        let mut input = full_v2();
        input["sentences"] = json!([
            { "originalText": "第一句", "speaker": "Partner", "flirtScore": 0 },
            "not an object",
            { "originalText": "第二句", "speaker": "narrator", "flirtScore": 4.5,
              "hiddenMeaning": "試探", "scoreReason": "語氣" },
            sentence("第三句", "me", 12)
        ]);

        let normalized = normalize(descriptor, object(input));
        let sentences = normalized.result.sentences();
        let texts: Vec<&str> = sentences.iter().map(|s| s.original_text.as_str()).collect();
        assert_eq!(texts, vec!["第一句", "第二句", "第三句"]);

        assert_eq!(sentences[0].speaker, Speaker::Partner);
        assert_eq!(sentences[0].flirt_score, 1.0);
        assert_eq!(sentences[0].hidden_meaning, PLACEHOLDER_TEXT);
        assert_eq!(sentences[1].speaker, Speaker::Partner);
        assert_eq!(sentences[1].flirt_score, 4.5);
        assert_eq!(sentences[2].speaker, Speaker::Me);
        assert_eq!(sentences[2].flirt_score, 10.0);
        assert!(normalized
            .warnings
            .iter()
            .any(|warning| warning.starts_with("sentences[1]: expected an object")));
    }

    #[test]
    fn sentence_count_is_not_enforced() {
        let descriptor = SchemaVersion::V2.descriptor();
        let mut input = full_v2();
        input["sentences"] = Value::Array((0..12).map(|i| sentence(&i.to_string(), "me", 5)).collect());

        let normalized = normalize(descriptor, object(input));
        assert_eq!(normalized.result.sentence_count(), 12);
        assert!(normalized.warnings.is_empty());
    }

    #[test]
    fn radar_of_wrong_type_is_rebuilt() {
        let descriptor = SchemaVersion::V2.descriptor();
        let mut input = full_v2();
        input["radar"] = json!([1, 2, 3]);

        let normalized = normalize(descriptor, object(input));
        assert_complete(descriptor, &normalized.result);
        assert_eq!(normalized.result.as_map()["radar"].as_object().unwrap().len(), 6);
        assert_eq!(normalized.warnings[0], "radar: expected an object, got an array, rebuilt");
    }

    #[test]
    fn normalization_is_idempotent() {
        let messy = json!({
            "emotional": { "score": "3.5" },
            "totalScore": 99,
            "sentences": [ { "speaker": "ME" }, 7 ],
            "extraField": { "kept": true }
        });
        for version in [SchemaVersion::V1, SchemaVersion::V2] {
            let descriptor = version.descriptor();
            let once = normalize(descriptor, object(messy.clone())).result;
            let twice = normalize(descriptor, once.as_map().clone());
            assert_eq!(twice.result, once);
            assert!(twice.warnings.is_empty(), "{:?}", twice.warnings);
            assert_eq!(once.as_map()["extraField"], json!({ "kept": true }));
        }
    }

    #[test]
    fn integer_scores_keep_integer_representation() {
        let descriptor = SchemaVersion::V1.descriptor();
        let normalized = normalize(descriptor, object(json!({ "totalScore": 7 })));
        assert_eq!(normalized.result.as_map()[FIELD_TOTAL_SCORE], json!(7));

        let normalized = normalize(descriptor, object(json!({ "totalScore": 7.25 })));
        assert_eq!(normalized.result.as_map()[FIELD_TOTAL_SCORE], json!(7.25));
    }

    #[test]
    fn defaults_come_from_the_descriptor() {
        for version in [SchemaVersion::V1, SchemaVersion::V2] {
            let descriptor = version.descriptor();
            let normalized = normalize(descriptor, Map::new());
            let map = normalized.result.as_map();
            for field in descriptor.required_fields() {
                assert_eq!(map[field], descriptor.default_for(field), "{field}");
            }
        }
    }

    #[test]
    fn long_model_strings_are_bounded_in_warnings() {
        let descriptor = SchemaVersion::V2.descriptor();
        let mut input = full_v2();
        input["totalScore"] = json!("很".repeat(5_000));
        input["sentences"][0]["speaker"] = json!("x".repeat(5_000));

        let normalized = normalize(descriptor, object(input));
        assert_eq!(normalized.warnings.len(), 2, "{:?}", normalized.warnings);
        for warning in &normalized.warnings {
            assert!(warning.chars().count() < PREVIEW_CHAR_LIMIT + 100, "{warning}");
            assert!(warning.contains("(truncated)"));
        }
    }
}
