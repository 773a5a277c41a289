use crate::error::AnalyzerError;
use std::{fmt, str::FromStr};

/// Question asked in `answer` mode when the caller supplied none.
pub const DEFAULT_QUESTION: &str = "What is in this image?";

/// The analysis tasks the model can be asked to perform.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AnalysisMode {
    /// Free-form description of the image.
    #[default]
    Describe,
    /// Object detection.
    Detect,
    /// Visual question answering.
    Answer,
}

impl AnalysisMode {
    /// Returns the mode as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisMode::Describe => "describe",
            AnalysisMode::Detect => "detect",
            AnalysisMode::Answer => "answer",
        }
    }
}

impl FromStr for AnalysisMode {
    type Err = AnalyzerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "describe" => Ok(AnalysisMode::Describe),
            "detect" => Ok(AnalysisMode::Detect),
            "answer" => Ok(AnalysisMode::Answer),
            other => Err(AnalyzerError::InvalidMode(other.to_string())),
        }
    }
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated analysis request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnalysisRequest {
    mode: AnalysisMode,
    question: Option<String>,
}

impl AnalysisRequest {
    /// Builds a request, discarding `question` unless `mode` is [`AnalysisMode::Answer`].
    pub fn new(mode: AnalysisMode, question: Option<String>) -> Self {
        let question = match mode {
            AnalysisMode::Answer => question,
            AnalysisMode::Describe | AnalysisMode::Detect => None,
        };
        Self { mode, question }
    }

    pub fn mode(&self) -> AnalysisMode {
        self.mode
    }

    pub fn question(&self) -> Option<&str> {
        self.question.as_deref()
    }

    /// Builds the model prompt. Every prompt ends with a single newline.
    pub fn prompt(&self) -> String {
        match self.mode {
            AnalysisMode::Describe => "describe en\n".to_string(),
            AnalysisMode::Detect => "detect object\n".to_string(),
            AnalysisMode::Answer => {
                let question = self
                    .question()
                    .filter(|q| !q.is_empty())
                    .unwrap_or(DEFAULT_QUESTION);
                format!("answer en {question}\n")
            }
        }
    }
}
