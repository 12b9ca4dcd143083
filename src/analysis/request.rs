use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    ZhTw,
    ZhCn,
}

impl Language {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().replace('_', "-").to_lowercase().as_str() {
            "zh-tw" => Some(Language::ZhTw),
            "zh-cn" => Some(Language::ZhCn),
            _ => None,
        }
    }

    /// Unrecognized or missing tags fall back to the default language.
    pub fn resolve(value: Option<&str>) -> Self {
        value.and_then(Language::parse).unwrap_or_default()
    }

    pub const fn as_tag(self) -> &'static str {
        match self {
            Language::ZhTw => "zh-TW",
            Language::ZhCn => "zh-CN",
        }
    }

    /// Name written into the prompt so the model knows which script to answer in.
    pub const fn prompt_name(self) -> &'static str {
        match self {
            Language::ZhTw => "繁體中文 (Traditional Chinese)",
            Language::ZhCn => "简体中文 (Simplified Chinese)",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    #[serde(default)]
    pub image_base64: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

/// Inbound body: either the bare request or the callable-style `{"data": {...}}` wrapper.
/// A top-level `imageBase64` wins over the wrapper.
#[derive(Debug, Deserialize)]
pub struct RequestBody {
    #[serde(default)]
    data: Option<AnalysisRequest>,
    #[serde(flatten)]
    bare: AnalysisRequest,
}

impl RequestBody {
    pub fn into_request(self) -> AnalysisRequest {
        match self.data {
            Some(data) if self.bare.image_base64.is_none() => data,
            _ => self.bare,
        }
    }
}
