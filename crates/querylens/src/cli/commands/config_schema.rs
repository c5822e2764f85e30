use anyhow::Result;

use super::{command_failure, emit};
use crate::config::config_json_schema;
use crate::models::ReportEnvelope;

const COMMAND: &str = "config-schema";

pub fn run() -> Result<()> {
    let schema = config_json_schema().map_err(|error| {
        command_failure(
            COMMAND,
            "report_encode_failed",
            "failed to encode config schema",
            &error,
        )
        .into_error()
    })?;
    emit(&ReportEnvelope::ok(COMMAND, schema))
}
