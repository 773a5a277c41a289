use crate::{
    config::AnalyzerConfig,
    engine::{EngineState, GenerationEngine},
    error::AnalyzerError,
    model::NormalizedImage,
    normalize::Normalizer,
    prompt::{AnalysisMode, AnalysisRequest},
};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};

/// A file part received from the caller.
#[derive(Clone, Debug)]
pub struct UploadedImage {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// The fields of an `/analyze` form, as collected at the HTTP boundary.
#[derive(Clone, Debug, Default)]
pub struct AnalysisForm {
    pub image: Option<UploadedImage>,
    pub analysis_type: Option<String>,
    pub question: Option<String>,
}

impl AnalysisForm {
    /// Records an `image` part. Parts without a filename are plain values and
    /// are ignored, as is any `image` part after the first upload.
    pub fn push_image(&mut self, filename: Option<String>, bytes: Vec<u8>) {
        let Some(filename) = filename else {
            log::debug!("Ignoring image part without a filename");
            return;
        };
        if self.image.is_some() {
            log::debug!("Ignoring repeated image part");
            return;
        }
        self.image = Some(UploadedImage { filename, bytes });
    }

    /// Records a text part. Only `analysis_type` and `question` are kept; the
    /// first occurrence of each wins.
    pub fn push_text(&mut self, name: &str, value: String) {
        let slot = match name {
            "analysis_type" => &mut self.analysis_type,
            "question" => &mut self.question,
            _ => return,
        };
        if slot.is_none() {
            *slot = Some(value);
        }
    }
}

/// A successful analysis.
#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisOutcome {
    pub result: String,
    pub mode: AnalysisMode,
}

/// Body returned across the request boundary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultEnvelope {
    Success { result: String, analysis_type: String },
    Failure { error: String },
}

impl ResultEnvelope {
    pub fn failure(error: impl Into<String>) -> Self {
        ResultEnvelope::Failure {
            error: error.into(),
        }
    }
}

impl From<AnalysisOutcome> for ResultEnvelope {
    fn from(outcome: AnalysisOutcome) -> Self {
        ResultEnvelope::Success {
            result: outcome.result,
            analysis_type: outcome.mode.as_str().to_string(),
        }
    }
}

/// An envelope together with the HTTP status it should be sent with.
#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisResponse {
    pub status: u16,
    pub envelope: ResultEnvelope,
}

impl AnalysisResponse {
    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

impl From<Result<AnalysisOutcome, AnalyzerError>> for AnalysisResponse {
    fn from(result: Result<AnalysisOutcome, AnalyzerError>) -> Self {
        match result {
            Ok(outcome) => AnalysisResponse {
                status: 200,
                envelope: outcome.into(),
            },
            Err(e) => {
                let status = e.status_code();
                if e.is_client_error() {
                    log::warn!("Rejected analysis request: {e}");
                } else {
                    log::error!("Analysis failed: {e}");
                }
                AnalysisResponse {
                    status,
                    envelope: ResultEnvelope::failure(e.to_string()),
                }
            }
        }
    }
}

/// Turns analysis forms into model calls and model output into envelopes.
#[derive(Clone)]
pub struct Dispatcher {
    engine: Arc<GenerationEngine>,
    normalizer: Normalizer,
    timeout: Option<Duration>,
}

impl Dispatcher {
    pub fn new(engine: Arc<GenerationEngine>, config: &AnalyzerConfig) -> Self {
        Self {
            engine,
            normalizer: Normalizer::from_config(config),
            timeout: config.generation_timeout,
        }
    }

    /// Returns the state of the shared engine.
    pub fn engine_state(&self) -> EngineState {
        self.engine.state()
    }

    /// Runs the model once on `image` with the prompt built from `request`.
    ///
    /// The model output is returned as-is.
    pub fn dispatch(
        &self,
        image: NormalizedImage,
        request: &AnalysisRequest,
    ) -> Result<String, AnalyzerError> {
        let prompt = request.prompt();
        log::info!("Dispatching {} request with prompt {:?}", request.mode(), prompt);

        let response = self.engine.generate(image, prompt, self.timeout)?;
        log::info!(
            "Request #{} answered in {:?}",
            response.id,
            response.duration
        );
        Ok(response.text)
    }

    /// Validates `form`, normalizes its image and dispatches it.
    ///
    /// Validation happens before decoding; rejected forms never reach the model.
    pub fn analyze(&self, form: AnalysisForm) -> Result<AnalysisOutcome, AnalyzerError> {
        let image = form.image.ok_or(AnalyzerError::MissingImage)?;
        if image.filename.is_empty() {
            return Err(AnalyzerError::NoImageSelected);
        }

        let mode = match form.analysis_type.as_deref() {
            Some(value) => value.parse()?,
            None => AnalysisMode::default(),
        };
        let request = AnalysisRequest::new(mode, form.question);

        let normalized = self.normalizer.normalize(&image.bytes)?;
        let result = self.dispatch(normalized, &request)?;

        Ok(AnalysisOutcome { result, mode })
    }

    /// Request boundary: every failure becomes an error envelope.
    pub fn handle(&self, form: AnalysisForm) -> AnalysisResponse {
        self.analyze(form).into()
    }
}
