use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::analysis::schema::{FIELD_SENTENCES, FIELD_TOTAL_SCORE};
#[cfg(test)]
use crate::analysis::schema::{METRIC_DESCRIPTION, METRIC_SCORE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Me,
    Partner,
}

impl Speaker {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "me" => Some(Speaker::Me),
            "partner" => Some(Speaker::Partner),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Speaker::Me => "me",
            Speaker::Partner => "partner",
        }
    }
}

#[cfg(test)]
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub score: f64,
    pub description: String,
}

#[cfg(test)]
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentenceInsight {
    pub original_text: String,
    pub speaker: Speaker,
    pub hidden_meaning: String,
    pub flirt_score: f64,
    pub score_reason: String,
}

/// Normalized analysis payload. Only the normalizer builds one, so every
/// required field of the active schema version is present and typed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AnalysisResult(Map<String, Value>);

impl AnalysisResult {
    pub(crate) fn from_normalized(fields: Map<String, Value>) -> Self {
        AnalysisResult(fields)
    }

    pub fn total_score(&self) -> f64 {
        self.0
            .get(FIELD_TOTAL_SCORE)
            .and_then(Value::as_f64)
            .unwrap_or_default()
    }

    pub fn sentence_count(&self) -> usize {
        self.0
            .get(FIELD_SENTENCES)
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

/// Typed views used by tests to inspect normalized output.
#[cfg(test)]
impl AnalysisResult {
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    /// Looks the metric up at the top level and inside any nested metric group.
    pub fn metric(&self, key: &str) -> Option<Metric> {
        let entry = self
            .0
            .get(key)
            .filter(|value| value.get(METRIC_SCORE).is_some())
            .or_else(|| {
                self.0
                    .values()
                    .filter_map(Value::as_object)
                    .find_map(|group| group.get(key))
            })?;
        Some(Metric {
            score: entry.get(METRIC_SCORE)?.as_f64()?,
            description: entry.get(METRIC_DESCRIPTION)?.as_str()?.to_string(),
        })
    }

    pub fn sentences(&self) -> Vec<SentenceInsight> {
        self.0
            .get(FIELD_SENTENCES)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| serde_json::from_value(item.clone()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}
