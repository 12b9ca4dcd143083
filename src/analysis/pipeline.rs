use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::analysis::error::{classify, AnalysisError, ErrorCode, ErrorEnvelope};
use crate::analysis::normalizer::normalize;
use crate::analysis::parser::{parse_model_output, ParsedOutput};
use crate::analysis::prompt::{build_system_prompt, USER_INSTRUCTION};
use crate::analysis::request::{AnalysisRequest, Language};
use crate::analysis::result::AnalysisResult;
use crate::analysis::schema::{SchemaVersion, SUGGESTED_SENTENCE_COUNT};
use crate::llm::gateway::{ModelGateway, ModelRequest};
use crate::llm::media::{prepare_image_payload, ImagePayloadError};
use crate::utils::timing::{complete_request_timer, start_request_timer};

const IMAGE_FIELD: &str = "imageBase64";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Validated,
    PromptBuilt,
    ModelCalled,
    ResponseClassified,
    Normalized,
    Assembled,
    Returned,
}

impl Stage {
    pub const fn as_str(self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::Validated => "validated",
            Stage::PromptBuilt => "prompt_built",
            Stage::ModelCalled => "model_called",
            Stage::ResponseClassified => "response_classified",
            Stage::Normalized => "normalized",
            Stage::Assembled => "assembled",
            Stage::Returned => "returned",
        }
    }
}

/// A failure tagged with the last stage the request reached.
#[derive(Debug)]
struct Failed {
    stage: Stage,
    error: AnalysisError,
}

struct ValidatedRequest {
    language: Language,
    image_data_uri: String,
    image_mime: String,
    image_bytes: usize,
}

/// Drives one analysis request from validation to the normalized result.
/// Built once at startup; the schema version is fixed for the deployment.
pub struct RequestHandler {
    gateway: Arc<dyn ModelGateway>,
    schema: SchemaVersion,
    next_request_id: AtomicU64,
}

impl RequestHandler {
    pub fn new(gateway: Arc<dyn ModelGateway>, schema: SchemaVersion) -> Self {
        RequestHandler {
            gateway,
            schema,
            next_request_id: AtomicU64::new(1),
        }
    }

    pub fn schema_version(&self) -> SchemaVersion {
        self.schema
    }

    pub async fn handle(&self, request: AnalysisRequest) -> Result<AnalysisResult, ErrorEnvelope> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let language = Language::resolve(request.language.as_deref());
        let image_chars = request.image_base64.as_deref().map(str::len).unwrap_or(0);
        let mut timer =
            start_request_timer("analyze_chat", request_id, language.as_tag(), image_chars);

        match self.run(request_id, request).await {
            Ok(result) => {
                debug!("request_id={} stage={}", request_id, Stage::Returned.as_str());
                complete_request_timer(&mut timer, "success", None);
                Ok(result)
            }
            Err(Failed { stage, error }) => {
                let kind = error.kind();
                let envelope = classify(&error);
                match kind.code() {
                    ErrorCode::InvalidArgument => warn!(
                        "request_id={} failed at stage={} kind={}: {}",
                        request_id,
                        stage.as_str(),
                        kind.as_str(),
                        error
                    ),
                    ErrorCode::Internal => error!(
                        "request_id={} failed at stage={} kind={}: {}",
                        request_id,
                        stage.as_str(),
                        kind.as_str(),
                        error
                    ),
                }
                complete_request_timer(
                    &mut timer,
                    "error",
                    Some(format!(
                        "stage={} kind={} code={}",
                        stage.as_str(),
                        kind.as_str(),
                        envelope.code.as_str()
                    )),
                );
                Err(envelope)
            }
        }
    }

    async fn run(&self, request_id: u64, request: AnalysisRequest) -> Result<AnalysisResult, Failed> {
        let fail = |stage: Stage| move |error: AnalysisError| Failed { stage, error };
        debug!("request_id={} stage={}", request_id, Stage::Received.as_str());

        let validated = validate(request).map_err(fail(Stage::Received))?;
        debug!(
            "request_id={} stage={} language={} image_mime={} image_bytes={}",
            request_id,
            Stage::Validated.as_str(),
            validated.language.as_tag(),
            validated.image_mime,
            validated.image_bytes
        );

        let descriptor = self.schema.descriptor();
        let model_request = ModelRequest {
            system_prompt: build_system_prompt(validated.language, descriptor),
            user_text: USER_INSTRUCTION.to_string(),
            image_data_uri: validated.image_data_uri,
        };
        debug!(
            "request_id={} stage={} schema={}",
            request_id,
            Stage::PromptBuilt.as_str(),
            self.schema.as_str()
        );

        let reply = self
            .gateway
            .complete(&model_request)
            .await
            .map_err(|err| fail(Stage::PromptBuilt)(AnalysisError::from(err)))?;
        debug!(
            "request_id={} stage={} provider={} model={} duration_s={:.3} content_chars={} total_tokens={:?}",
            request_id,
            Stage::ModelCalled.as_str(),
            self.gateway.provider(),
            self.gateway.model(),
            reply.duration.as_secs_f64(),
            reply.content.chars().count(),
            reply.usage.map(|usage| usage.total_tokens)
        );

        let parsed = parse_model_output(&reply.content)
            .map_err(|err| fail(Stage::ModelCalled)(AnalysisError::from(err)))?;
        let fields = match parsed {
            ParsedOutput::Rejected => {
                return Err(fail(Stage::ResponseClassified)(AnalysisError::ContentRejected));
            }
            ParsedOutput::Analysis(fields) => fields,
        };
        debug!(
            "request_id={} stage={} fields={}",
            request_id,
            Stage::ResponseClassified.as_str(),
            fields.len()
        );

        let normalized = normalize(descriptor, fields);
        if !normalized.warnings.is_empty() {
            warn!(
                "request_id={} normalization applied {} coercion(s): {}",
                request_id,
                normalized.warnings.len(),
                normalized.warnings.join("; ")
            );
        }
        debug!("request_id={} stage={}", request_id, Stage::Normalized.as_str());

        let result = normalized.result;
        let (min_sentences, max_sentences) = SUGGESTED_SENTENCE_COUNT;
        let sentence_count = result.sentence_count();
        if !(min_sentences..=max_sentences).contains(&sentence_count) {
            info!(
                "request_id={} model returned {} sentence(s), outside suggested {}..={}",
                request_id, sentence_count, min_sentences, max_sentences
            );
        }
        debug!(
            "request_id={} stage={} total_score={}",
            request_id,
            Stage::Assembled.as_str(),
            result.total_score()
        );
        Ok(result)
    }
}

fn validate(request: AnalysisRequest) -> Result<ValidatedRequest, AnalysisError> {
    let language = Language::resolve(request.language.as_deref());
    let raw = request
        .image_base64
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| AnalysisError::input(IMAGE_FIELD, "is required"))?;

    let payload = prepare_image_payload(&raw).map_err(|err| match err {
        ImagePayloadError::Empty => AnalysisError::input(IMAGE_FIELD, "is required"),
        other => AnalysisError::input(IMAGE_FIELD, other.to_string()),
    })?;

    Ok(ValidatedRequest {
        language,
        image_data_uri: payload.data_uri,
        image_mime: payload.mime_type,
        image_bytes: payload.decoded_len,
    })
}
