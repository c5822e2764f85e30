//! The JSON document every command prints on stdout.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::aggregate::DateWindow;
use crate::utils::time::{format_date, now_utc_timestamp};

pub const REPORT_ENVELOPE_SCHEMA_VERSION: &str = "querylens.report-envelope.v1";

pub type ReportMeta = BTreeMap<String, Value>;

/// A non-fatal condition attached to an otherwise successful report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportWarning {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportError {
    pub code: String,
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEnvelope {
    pub ok: bool,
    pub command: String,
    pub generated_at_utc: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    pub meta: ReportMeta,
    pub warnings: Vec<ReportWarning>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ReportError>,
}

impl ReportEnvelope {
    #[must_use]
    pub fn ok(command: impl Into<String>, data: Value) -> Self {
        let mut envelope = Self::stamped(command.into(), true);
        envelope.data = Some(data);
        envelope
    }

    #[must_use]
    pub fn error(
        command: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let mut envelope = Self::stamped(command.into(), false);
        envelope.error = Some(ReportError {
            code: code.into(),
            message: message.into(),
            details: None,
        });
        envelope
    }

    /// Error envelope for a rejected argument; `details` names the field.
    #[must_use]
    pub fn invalid_input(command: impl Into<String>, failure: &InputValidationFailure) -> Self {
        Self::error(command, "input_invalid", failure.to_string()).with_error_details(json!({
            "field": failure.field,
            "message": failure.message,
        }))
    }

    fn stamped(command: String, ok: bool) -> Self {
        Self {
            ok,
            command,
            generated_at_utc: now_utc_timestamp(),
            data: None,
            meta: ReportMeta::from([(
                "schema_version".to_string(),
                json!(REPORT_ENVELOPE_SCHEMA_VERSION),
            )]),
            warnings: Vec::new(),
            error: None,
        }
    }

    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.insert(key.into(), value);
        self
    }

    /// Records the inclusive day range the report covers.
    #[must_use]
    pub fn with_window(self, window: &DateWindow) -> Self {
        self.with_meta("window_start", json!(format_date(window.start)))
            .with_meta("window_end", json!(format_date(window.end)))
    }

    #[must_use]
    pub fn with_warning(mut self, code: impl Into<String>, message: impl Into<String>) -> Self {
        self.warnings.push(ReportWarning {
            code: code.into(),
            message: message.into(),
        });
        self
    }

    /// No-op on success envelopes.
    #[must_use]
    pub fn with_error_details(mut self, details: Value) -> Self {
        if let Some(error) = self.error.as_mut() {
            error.details = Some(details);
        }
        self
    }
}

/// A command failure whose error envelope has already been rendered.
#[derive(Debug, Clone)]
pub struct ReportCommandFailure {
    envelope: ReportEnvelope,
}

impl ReportCommandFailure {
    #[must_use]
    pub fn new(envelope: ReportEnvelope) -> Self {
        Self { envelope }
    }

    #[must_use]
    pub fn envelope(&self) -> &ReportEnvelope {
        &self.envelope
    }
}

impl Display for ReportCommandFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.envelope.error {
            Some(error) => write!(f, "{}: {}", error.code, error.message),
            None => write!(f, "`{}` failed", self.envelope.command),
        }
    }
}

impl std::error::Error for ReportCommandFailure {}

/// Caller supplied something the commands cannot work with (bad date, inverted range).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputValidationFailure {
    pub field: String,
    pub message: String,
}

impl InputValidationFailure {
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl Display for InputValidationFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid `{}`: {}", self.field, self.message)
    }
}

impl std::error::Error for InputValidationFailure {}
