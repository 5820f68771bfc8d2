use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),
    #[error("Resolution error: {0}")]
    Resolution(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Failed to read '{path}'{}: {message}", row_suffix(.row))]
    SourceRead {
        path: String,
        row: Option<usize>,
        message: String,
    },
    #[error("Invalid value: {0}")]
    InvalidValue(String),
    #[error("Processing error: {0}")]
    Processing(String),
    #[error("Processing was cancelled")]
    Cancelled,
    #[error("Step '{step}' failed: {source}")]
    Step {
        step: String,
        #[source]
        source: Box<ProcessorError>,
    },
}

fn row_suffix(row: &Option<usize>) -> String {
    match row {
        Some(row) => format!(" at row {}", row),
        None => String::new(),
    }
}

/// Coarse classification used by callers deciding how to react to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Resolution,
    Conflict,
    SourceRead,
    InvalidValue,
    Io,
    Cancelled,
    Other,
}

impl ProcessorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProcessorError::InvalidManifest(_) => ErrorKind::Configuration,
            ProcessorError::Resolution(_) => ErrorKind::Resolution,
            ProcessorError::Conflict(_) => ErrorKind::Conflict,
            ProcessorError::SourceRead { .. } | ProcessorError::Csv(_) => ErrorKind::SourceRead,
            ProcessorError::InvalidValue(_) => ErrorKind::InvalidValue,
            ProcessorError::Io(_) => ErrorKind::Io,
            ProcessorError::Cancelled => ErrorKind::Cancelled,
            ProcessorError::Step { source, .. } => source.kind(),
            ProcessorError::Json(_) | ProcessorError::Processing(_) => ErrorKind::Other,
        }
    }

    /// The innermost error, unwrapping step context.
    pub fn root(&self) -> &ProcessorError {
        match self {
            ProcessorError::Step { source, .. } => source.root(),
            other => other,
        }
    }

    /// The path of the step that failed, when known.
    pub fn step(&self) -> Option<&str> {
        match self {
            ProcessorError::Step { step, .. } => Some(step.as_str()),
            _ => None,
        }
    }

    pub(crate) fn in_step(self, step: &str) -> Self {
        match self {
            ProcessorError::Step { .. } => self,
            other => ProcessorError::Step {
                step: step.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// Row-level read failures that a lenient run may skip over.
    pub(crate) fn is_row_skippable(&self) -> bool {
        matches!(self, ProcessorError::SourceRead { row: Some(_), .. })
    }
}

#[derive(Debug, Clone)]
pub struct ProcessingMessage {
    pub message: String,
    pub source: Option<String>,
}

impl ProcessingMessage {
    pub fn new(message: impl Into<String>, source: Option<String>) -> Self {
        Self {
            message: message.into(),
            source,
        }
    }
}

impl std::fmt::Display for ProcessingMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.source {
            Some(source) => write!(f, "[{}] {}", source, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct ProcessingState {
    warnings: Vec<ProcessingMessage>,
    errors: Vec<ProcessingMessage>,
}

impl ProcessingState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_warning(&mut self, message: impl Into<String>, source: Option<String>) {
        let message = ProcessingMessage::new(message, source);
        tracing::warn!("{}", message);
        self.warnings.push(message);
    }

    pub fn add_error(&mut self, message: impl Into<String>, source: Option<String>) {
        self.errors.push(ProcessingMessage::new(message, source));
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn get_warnings(&self) -> &[ProcessingMessage] {
        &self.warnings
    }

    pub fn get_errors(&self) -> &[ProcessingMessage] {
        &self.errors
    }

    pub fn merge(&mut self, other: ProcessingState) {
        self.warnings.extend(other.warnings);
        self.errors.extend(other.errors);
    }
}

#[derive(Debug)]
pub enum ProcessingOutcome {
    Success,
    SuccessWithWarnings(Vec<ProcessingMessage>),
    Failure {
        errors: Vec<ProcessingMessage>,
        warnings: Vec<ProcessingMessage>,
    },
}

impl ProcessingOutcome {
    pub fn from_state(state: ProcessingState) -> Self {
        if state.errors.is_empty() && state.warnings.is_empty() {
            ProcessingOutcome::Success
        } else if state.has_errors() {
            ProcessingOutcome::Failure {
                errors: state.errors,
                warnings: state.warnings,
            }
        } else {
            ProcessingOutcome::SuccessWithWarnings(state.warnings)
        }
    }

    pub fn warnings(&self) -> &[ProcessingMessage] {
        match self {
            ProcessingOutcome::Success => &[],
            ProcessingOutcome::SuccessWithWarnings(warnings) => warnings,
            ProcessingOutcome::Failure { warnings, .. } => warnings,
        }
    }

    /// Log a summary and turn accumulated errors into a single failure.
    /// Warnings are logged once, when they are recorded.
    pub fn report(&self) -> anyhow::Result<()> {
        match self {
            ProcessingOutcome::Success => {
                tracing::info!("Processing finished without warnings");
                Ok(())
            }
            ProcessingOutcome::SuccessWithWarnings(warnings) => {
                tracing::info!("Processing finished with {} warning(s)", warnings.len());
                Ok(())
            }
            ProcessingOutcome::Failure { errors, warnings } => {
                for error in errors {
                    tracing::error!("{}", error);
                }
                anyhow::bail!(
                    "Processing finished with {} error(s) and {} warning(s)",
                    errors.len(),
                    warnings.len()
                )
            }
        }
    }
}
