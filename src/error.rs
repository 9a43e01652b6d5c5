use thiserror::Error;

/// Failure of a single call to an external collaborator.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Underlying request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Provider returned non-success status {0}")]
    Status(u16),

    #[error("Failed to parse JSON response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Response is missing {0}")]
    MissingData(String),

    // Nothing further can be fetched from this provider in this pass
    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

impl FetchError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, FetchError::Unavailable(_))
    }
}

/// Request-fatal outcomes of the route pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("origin could not be resolved")]
    InvalidStart,

    #[error("destination could not be resolved")]
    InvalidDestination,

    #[error("no route alternative could be fetched")]
    NoValidRoutes,

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl PipelineError {
    /// The only text about a failure that is ever shown to a user
    pub fn user_message(&self) -> &'static str {
        match self {
            PipelineError::InvalidStart => "Invalid starting point",
            PipelineError::InvalidDestination => "Invalid destination",
            PipelineError::NoValidRoutes => "No valid routes found",
            PipelineError::Internal(_) => "Error processing request",
        }
    }
}
