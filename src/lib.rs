//! Image analysis on top of a multimodal generation model.
//!
//! Uploaded images are decoded, center-cropped and resized to a fixed square,
//! paired with a prompt for the requested [`AnalysisMode`] and run through a
//! [`GenerationModel`] owned by a [`GenerationEngine`]. The [`Dispatcher`] is
//! the request boundary and always answers with a [`ResultEnvelope`].

pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod model;
pub mod normalize;
pub mod prompt;

pub use config::{AnalyzerConfig, ProviderCredentials};
pub use dispatch::{
    AnalysisForm, AnalysisOutcome, AnalysisResponse, Dispatcher, ResultEnvelope, UploadedImage,
};
pub use engine::{EngineResponse, EngineState, GenerationEngine};
pub use error::{AnalyzerError, ConfigError};
pub use model::{GenerationModel, NormalizedImage};
pub use normalize::{Normalizer, crop_box, normalize};
pub use prompt::{AnalysisMode, AnalysisRequest, DEFAULT_QUESTION};
