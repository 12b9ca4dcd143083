use serde_json::{json, Number, Value};

pub const FIELD_TOTAL_SCORE: &str = "totalScore";
pub const FIELD_RELATIONSHIP_STATUS: &str = "relationshipStatus";
pub const FIELD_SUMMARY: &str = "summary";
pub const FIELD_TONE_INSIGHT: &str = "toneInsight";
pub const FIELD_WITTY_CONCLUSION: &str = "wittyConclusion";
pub const FIELD_SENTENCES: &str = "sentences";
pub const FIELD_ADVANCED_SUMMARY: &str = "advancedSummary";
pub const FIELD_PARTNER_NAME: &str = "partnerName";

pub const METRIC_SCORE: &str = "score";
pub const METRIC_DESCRIPTION: &str = "description";

pub const PLACEHOLDER_DESCRIPTION: &str = "暫無分析";
pub const PLACEHOLDER_TEXT: &str = "暫無資料";

pub const REQUIRED_TEXT_FIELDS: [&str; 4] = [
    FIELD_RELATIONSHIP_STATUS,
    FIELD_SUMMARY,
    FIELD_TONE_INSIGHT,
    FIELD_ADVANCED_SUMMARY,
];

pub const OPTIONAL_TEXT_FIELDS: [&str; 2] = [FIELD_PARTNER_NAME, FIELD_WITTY_CONCLUSION];

pub const SCORE_RANGE: (f64, f64) = (0.0, 10.0);
pub const FLIRT_SCORE_RANGE: (f64, f64) = (1.0, 10.0);
pub const SUGGESTED_SENTENCE_COUNT: (usize, usize) = (3, 8);

/// Whole numbers stay integers so clamped or defaulted scores serialize
/// the way the model usually writes them.
pub fn score_value(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        return json!(value as i64);
    }
    Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or_else(|| json!(0))
}

/// How the normalizer repairs a top-level field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    MetricGroup,
    Metric,
    Score { range: (f64, f64), default: f64 },
    Text { placeholder: &'static str },
    Sentences,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchemaVersion {
    V1,
    #[default]
    V2,
}

impl SchemaVersion {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "v1" | "1" => Some(SchemaVersion::V1),
            "v2" | "2" => Some(SchemaVersion::V2),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            SchemaVersion::V1 => "v1",
            SchemaVersion::V2 => "v2",
        }
    }

    pub fn descriptor(self) -> &'static SchemaDescriptor {
        match self {
            SchemaVersion::V1 => &V1_DESCRIPTOR,
            SchemaVersion::V2 => &V2_DESCRIPTOR,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MetricSpec {
    pub key: &'static str,
    pub label: &'static str,
    pub guidance: &'static str,
}

#[derive(Debug)]
pub struct SchemaDescriptor {
    pub version: SchemaVersion,
    metrics: &'static [MetricSpec],
    metric_group: Option<&'static str>,
}

static V1_METRICS: [MetricSpec; 5] = [
    MetricSpec {
        key: "emotional",
        label: "情緒價值",
        guidance: "對方是否提供安慰、支持與正向回饋",
    },
    MetricSpec {
        key: "intimacy",
        label: "親密程度",
        guidance: "稱呼、話題深度與私人分享的程度",
    },
    MetricSpec {
        key: "playfulness",
        label: "曖昧趣味",
        guidance: "玩笑、調侃與推拉的頻率與品質",
    },
    MetricSpec {
        key: "responsive",
        label: "回應積極度",
        guidance: "回覆速度、長度與主動延續話題的意願",
    },
    MetricSpec {
        key: "balance",
        label: "互動平衡",
        guidance: "雙方投入是否對等，有無一方單向付出",
    },
];

static V2_METRICS: [MetricSpec; 6] = [
    MetricSpec {
        key: "tension",
        label: "張力",
        guidance: "對話中的曖昧張力與心跳感",
    },
    MetricSpec {
        key: "disclosure",
        label: "自我揭露",
        guidance: "是否分享私人感受、脆弱面或只對你說的事",
    },
    MetricSpec {
        key: "momentum",
        label: "推進力",
        guidance: "關係是否往見面、約會或更深話題推進",
    },
    MetricSpec {
        key: "exclusivity",
        label: "專屬感",
        guidance: "是否出現專屬稱呼、內部梗或排他暗示",
    },
    MetricSpec {
        key: "baiting",
        label: "拋餌",
        guidance: "是否主動丟出話題鉤子、期待你接球",
    },
    MetricSpec {
        key: "defense",
        label: "防禦",
        guidance: "迴避、敷衍或設立界線的程度（越高代表越防備）",
    },
];

static V1_DESCRIPTOR: SchemaDescriptor = SchemaDescriptor {
    version: SchemaVersion::V1,
    metrics: &V1_METRICS,
    metric_group: None,
};

static V2_DESCRIPTOR: SchemaDescriptor = SchemaDescriptor {
    version: SchemaVersion::V2,
    metrics: &V2_METRICS,
    metric_group: Some("radar"),
};

impl SchemaDescriptor {
    pub fn metrics(&self) -> &'static [MetricSpec] {
        self.metrics
    }

    pub fn metric_keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.metrics.iter().map(|metric| metric.key)
    }

    pub fn metric_group(&self) -> Option<&'static str> {
        self.metric_group
    }

    /// Top-level fields the normalized result always carries.
    pub fn required_fields(&self) -> Vec<&'static str> {
        let mut fields: Vec<&'static str> = match self.metric_group {
            Some(group) => vec![group],
            None => self.metric_keys().collect(),
        };
        fields.extend([
            FIELD_TOTAL_SCORE,
            FIELD_RELATIONSHIP_STATUS,
            FIELD_SUMMARY,
            FIELD_TONE_INSIGHT,
            FIELD_SENTENCES,
            FIELD_ADVANCED_SUMMARY,
        ]);
        fields
    }

    pub fn optional_fields(&self) -> &'static [&'static str] {
        &OPTIONAL_TEXT_FIELDS
    }

    pub fn default_metric(&self) -> Value {
        json!({
            METRIC_SCORE: 0,
            METRIC_DESCRIPTION: PLACEHOLDER_DESCRIPTION,
        })
    }

    pub fn field_kind(&self, field: &str) -> Option<FieldKind> {
        if Some(field) == self.metric_group {
            return Some(FieldKind::MetricGroup);
        }
        if self.metric_keys().any(|key| key == field) {
            return Some(FieldKind::Metric);
        }
        match field {
            FIELD_TOTAL_SCORE => Some(FieldKind::Score {
                range: SCORE_RANGE,
                default: SCORE_RANGE.0,
            }),
            FIELD_SENTENCES => Some(FieldKind::Sentences),
            _ if REQUIRED_TEXT_FIELDS
                .iter()
                .chain(OPTIONAL_TEXT_FIELDS.iter())
                .any(|known| *known == field) =>
            {
                Some(FieldKind::Text {
                    placeholder: PLACEHOLDER_TEXT,
                })
            }
            _ => None,
        }
    }

    /// Filler value for a field the model left out. Unknown fields have none.
    pub fn default_for(&self, field: &str) -> Value {
        match self.field_kind(field) {
            Some(FieldKind::MetricGroup) => Value::Object(
                self.metric_keys()
                    .map(|key| (key.to_string(), self.default_metric()))
                    .collect(),
            ),
            Some(FieldKind::Metric) => self.default_metric(),
            Some(FieldKind::Score { default, .. }) => score_value(default),
            Some(FieldKind::Text { placeholder }) => Value::String(placeholder.to_string()),
            Some(FieldKind::Sentences) => Value::Array(Vec::new()),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v1_lists_flat_metrics_as_required_fields() {
        let fields = SchemaVersion::V1.descriptor().required_fields();
        assert_eq!(
            fields,
            vec![
                "emotional",
                "intimacy",
                "playfulness",
                "responsive",
                "balance",
                "totalScore",
                "relationshipStatus",
                "summary",
                "toneInsight",
                "sentences",
                "advancedSummary",
            ]
        );
    }

    #[test]
    fn v2_groups_six_metrics_under_radar() {
        let descriptor = SchemaVersion::V2.descriptor();
        assert_eq!(descriptor.metric_group(), Some("radar"));
        assert_eq!(descriptor.metrics().len(), 6);
        assert_eq!(descriptor.required_fields()[0], "radar");

        let radar = descriptor.default_for("radar");
        let radar = radar.as_object().unwrap();
        assert_eq!(radar.len(), 6);
        assert_eq!(radar["defense"]["score"], json!(0));
    }

    #[test]
    fn every_required_field_has_a_kind_and_default() {
        for version in [SchemaVersion::V1, SchemaVersion::V2] {
            let descriptor = version.descriptor();
            for field in descriptor.required_fields() {
                assert!(descriptor.field_kind(field).is_some(), "{field} has no kind");
                assert!(!descriptor.default_for(field).is_null(), "{field} has no default");
            }
        }
        let descriptor = SchemaVersion::V2.descriptor();
        assert_eq!(descriptor.default_for("totalScore"), json!(0));
        assert_eq!(descriptor.default_for("summary"), json!(PLACEHOLDER_TEXT));
        assert_eq!(descriptor.default_for("sentences"), json!([]));
        assert_eq!(descriptor.field_kind("emotional"), None);
        assert_eq!(descriptor.default_for("extraField"), Value::Null);
    }

    #[test]
    fn parses_version_names() {
        assert_eq!(SchemaVersion::parse(" V1 "), Some(SchemaVersion::V1));
        assert_eq!(SchemaVersion::parse("2"), Some(SchemaVersion::V2));
        assert_eq!(SchemaVersion::parse("v3"), None);
    }
}
