pub mod records;
pub mod report_envelope;

pub use records::{ExecutionRecord, SqlExecution, StepTiming};
pub use report_envelope::{
    InputValidationFailure, REPORT_ENVELOPE_SCHEMA_VERSION, ReportCommandFailure, ReportEnvelope,
    ReportError, ReportMeta, ReportWarning,
};
