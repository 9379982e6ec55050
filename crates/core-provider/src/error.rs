use thiserror::Error;

/// Every way a generation can fail. Transport, auth and decode failures are
/// all folded into [`CompletionError::Provider`] so callers handle one shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompletionError {
    /// `status` is `None` when no HTTP response was received.
    #[error("provider error{}: {message}", status_suffix(.status))]
    Provider {
        status: Option<u16>,
        message: String,
    },
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("tokenizer: {0}")]
    Tokenizer(String),
}

impl CompletionError {
    pub fn provider(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Provider {
            status,
            message: message.into(),
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

pub type CompletionResult<T> = Result<T, CompletionError>;
