use std::time::Duration;

/// Errors produced while analyzing an uploaded image.
#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    /// The multipart form carried no `image` file part.
    #[error("No image uploaded")]
    MissingImage,

    /// The `image` part was present but its filename was empty.
    #[error("No image selected")]
    NoImageSelected,

    /// The requested analysis type is not one of the supported modes.
    #[error("Unsupported analysis type: {0}")]
    InvalidMode(String),

    /// The uploaded bytes could not be decoded as an image.
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    /// The configured target size has a zero edge.
    #[error("Invalid target size: {width}x{height}")]
    InvalidTargetSize { width: usize, height: usize },

    #[error(transparent)]
    Image(#[from] kornia_image::ImageError),

    /// The generation model failed to produce an output.
    #[error("Model error: {0}")]
    Model(String),

    /// The generation model did not answer within the configured time box.
    #[error("Model did not respond within {0:?}")]
    Timeout(Duration),

    /// The engine worker is no longer accepting requests.
    #[error("Inference engine is not running")]
    EngineStopped,
}

impl AnalyzerError {
    /// Returns the HTTP status code class this error is surfaced as.
    pub fn status_code(&self) -> u16 {
        match self {
            AnalyzerError::MissingImage
            | AnalyzerError::NoImageSelected
            | AnalyzerError::InvalidMode(_)
            | AnalyzerError::Decode(_) => 400,
            AnalyzerError::InvalidTargetSize { .. }
            | AnalyzerError::Image(_)
            | AnalyzerError::Model(_)
            | AnalyzerError::Timeout(_)
            | AnalyzerError::EngineStopped => 500,
        }
    }

    /// Returns true when the caller supplied the faulty input.
    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }
}

/// Errors raised while loading process configuration at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingCredential(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_client_errors() {
        assert_eq!(AnalyzerError::MissingImage.status_code(), 400);
        assert_eq!(AnalyzerError::NoImageSelected.status_code(), 400);
        assert_eq!(AnalyzerError::InvalidMode("x".into()).status_code(), 400);
        assert!(AnalyzerError::MissingImage.is_client_error());
    }

    #[test]
    fn model_errors_are_server_errors() {
        assert_eq!(AnalyzerError::Model("boom".into()).status_code(), 500);
        assert_eq!(
            AnalyzerError::Timeout(Duration::from_secs(1)).status_code(),
            500
        );
        assert_eq!(AnalyzerError::EngineStopped.status_code(), 500);
        assert!(!AnalyzerError::EngineStopped.is_client_error());
    }

    #[test]
    fn messages_match_the_wire_contract() {
        assert_eq!(AnalyzerError::MissingImage.to_string(), "No image uploaded");
        assert_eq!(AnalyzerError::NoImageSelected.to_string(), "No image selected");
        assert_eq!(
            AnalyzerError::InvalidMode("caption".into()).to_string(),
            "Unsupported analysis type: caption"
        );
    }
}
