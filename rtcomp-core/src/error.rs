use std::borrow::Cow;
use std::fmt;

/// Stable return codes shared by every layer of the runtime.
///
/// These mirror the result codes a CORBA-style broker boundary would use:
/// control flow at every public API is expressed as a value, never as an
/// exception that crosses a component boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnCode {
    Ok,
    PreconditionNotMet,
    BadParameter,
    NotAvailable,
    InternalError,
}

impl ReturnCode {
    pub fn is_ok(self) -> bool {
        matches!(self, ReturnCode::Ok)
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ReturnCode::Ok => "OK",
            ReturnCode::PreconditionNotMet => "PRECONDITION_NOT_MET",
            ReturnCode::BadParameter => "BAD_PARAMETER",
            ReturnCode::NotAvailable => "NOT_AVAILABLE",
            ReturnCode::InternalError => "INTERNAL_ERROR",
        };
        f.write_str(label)
    }
}

/// A six-item error taxonomy used to classify an `RtcError` for logging and
/// automated handling without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    PreconditionViolation,
    NotAvailable,
    TransportFailure,
    HookFailure,
    BufferPressure,
    Fatal,
}

/// The single error type shared across the workspace.
///
/// Carries a stable [`ReturnCode`], a human-readable message, an optional
/// category hint, and an optional source error — enough for a caller to
/// branch on `code()` without string matching, while still supporting `?`
/// and `Display`/`Error` for day to day propagation.
#[derive(Debug)]
pub struct RtcError {
    code: ReturnCode,
    category: Option<ErrorCategory>,
    message: Cow<'static, str>,
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl RtcError {
    pub fn new(code: ReturnCode, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code,
            category: None,
            message: message.into(),
            source: None,
        }
    }

    pub fn precondition_not_met(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ReturnCode::PreconditionNotMet, message).with_category(ErrorCategory::PreconditionViolation)
    }

    pub fn not_available(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ReturnCode::NotAvailable, message).with_category(ErrorCategory::NotAvailable)
    }

    pub fn bad_parameter(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ReturnCode::BadParameter, message)
    }

    pub fn internal(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ReturnCode::InternalError, message).with_category(ErrorCategory::Fatal)
    }

    pub fn with_category(mut self, category: ErrorCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn code(&self) -> ReturnCode {
        self.code
    }

    pub fn category(&self) -> ErrorCategory {
        self.category.unwrap_or(match self.code {
            ReturnCode::Ok => ErrorCategory::PreconditionViolation,
            ReturnCode::PreconditionNotMet => ErrorCategory::PreconditionViolation,
            ReturnCode::BadParameter => ErrorCategory::PreconditionViolation,
            ReturnCode::NotAvailable => ErrorCategory::NotAvailable,
            ReturnCode::InternalError => ErrorCategory::Fatal,
        })
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for RtcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for RtcError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

pub type Result<T> = std::result::Result<T, RtcError>;
