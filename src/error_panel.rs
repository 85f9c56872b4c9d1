//! Turns failures into the dismissible panel shown to the user.

use std::fmt;

use crate::error::Error;

/// Where "Report Issue" points by default.
pub const DEFAULT_REPORT_URL: &str = "https://github.com";

/// User-facing category of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The API key is missing, invalid, or not allowed.
    Credential,
    /// The service could not be reached.
    Connectivity,
    /// Anything else.
    Generic,
}

impl ErrorCategory {
    /// Name of the icon drawn next to the panel title.
    pub fn icon(&self) -> &'static str {
        match self {
            ErrorCategory::Credential => "key-round",
            ErrorCategory::Connectivity => "wifi-off",
            ErrorCategory::Generic => "x-circle",
        }
    }
}

/// Title, description, and icon for a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub category: ErrorCategory,
    pub title: &'static str,
    pub description: String,
    pub icon: &'static str,
}

impl ErrorInfo {
    fn credential() -> Self {
        Self::of(
            ErrorCategory::Credential,
            "Authentication Error",
            "There seems to be an issue with your API configuration. Please check your credentials.",
        )
    }

    fn connectivity() -> Self {
        Self::of(
            ErrorCategory::Connectivity,
            "Connection Lost",
            "We couldn't reach the AI servers. Please check your internet connection and try again.",
        )
    }

    fn generic(text: &str) -> Self {
        let description = if text.is_empty() {
            "An unexpected error occurred while processing your request."
        } else {
            text
        };
        Self::of(ErrorCategory::Generic, "Something went wrong", description)
    }

    fn of(category: ErrorCategory, title: &'static str, description: &str) -> Self {
        Self {
            category,
            title,
            description: description.to_string(),
            icon: category.icon(),
        }
    }

    /// Categorizes a structured error.
    ///
    /// Credential and transport variants decide the category directly; other
    /// variants fall back to [`classify_error`] on their display text.
    pub fn from_error(err: &Error) -> Self {
        match err {
            Error::Authentication { .. }
            | Error::Permission { .. }
            | Error::SelectionRequired { .. } => Self::credential(),
            Error::Connection { .. } | Error::Timeout { .. } => Self::connectivity(),
            other => classify_error(&other.to_string()),
        }
    }
}

/// Categorizes an error message by case-insensitive substring.
///
/// Credential keywords win over connectivity keywords.
pub fn classify_error(text: &str) -> ErrorInfo {
    let lower = text.to_lowercase();
    if lower.contains("api_key") || lower.contains("key") {
        ErrorInfo::credential()
    } else if ["network", "fetch", "connect"]
        .iter()
        .any(|needle| lower.contains(needle))
    {
        ErrorInfo::connectivity()
    } else {
        ErrorInfo::generic(text)
    }
}

/// A failure as presented to the user, with its retry and report actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorPanel {
    /// The raw error text.
    pub message: String,
    pub info: ErrorInfo,
    /// Target of the "Report Issue" action.
    pub report_url: String,
}

impl ErrorPanel {
    /// Builds the panel for `err`.
    pub fn new(err: &Error, report_url: impl Into<String>) -> Self {
        Self {
            message: err.to_string(),
            info: ErrorInfo::from_error(err),
            report_url: report_url.into(),
        }
    }
}

impl fmt::Display for ErrorPanel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.info.title, self.info.description)
    }
}
