//! JSON report encoder
//!
//! Wraps summaries in a versioned envelope carrying producer metadata. The
//! envelope holds the only clock reading; the summaries themselves are pure.

use crate::aggregator::UserOutcome;
use crate::error::ComputeError;
use crate::types::GlobalSummary;
use crate::{FLUX_VERSION, PRODUCER_NAME};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

/// Current report schema version
pub const REPORT_VERSION: &str = "1.0.0";

/// Producer metadata
#[derive(Debug, Clone, Serialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Envelope for a batch of per-user reports
#[derive(Debug, Clone, Serialize)]
pub struct UserReportEnvelope {
    pub report_version: String,
    pub producer: ReportProducer,
    pub generated_at_utc: String,
    pub users: Vec<UserOutcome>,
}

/// Envelope for a global summary
#[derive(Debug, Clone, Serialize)]
pub struct GlobalReportEnvelope {
    pub report_version: String,
    pub producer: ReportProducer,
    pub generated_at_utc: String,
    pub global: GlobalSummary,
}

/// Report encoder
pub struct ReportEncoder {
    instance_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    fn producer(&self) -> ReportProducer {
        ReportProducer {
            name: PRODUCER_NAME.to_string(),
            version: FLUX_VERSION.to_string(),
            instance_id: self.instance_id.clone(),
        }
    }

    pub fn encode_users(&self, outcomes: &[UserOutcome]) -> UserReportEnvelope {
        UserReportEnvelope {
            report_version: REPORT_VERSION.to_string(),
            producer: self.producer(),
            generated_at_utc: Utc::now().to_rfc3339(),
            users: outcomes.to_vec(),
        }
    }

    pub fn encode_global(&self, summary: &GlobalSummary) -> GlobalReportEnvelope {
        GlobalReportEnvelope {
            report_version: REPORT_VERSION.to_string(),
            producer: self.producer(),
            generated_at_utc: Utc::now().to_rfc3339(),
            global: summary.clone(),
        }
    }
}

/// Serialize any report value, compact or pretty
pub fn to_json<T: Serialize>(value: &T, pretty: bool) -> Result<String, ComputeError> {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    json.map_err(|e| ComputeError::EncodingError(e.to_string()))
}

/// One JSON object per line, without an envelope
pub fn to_ndjson(outcomes: &[UserOutcome]) -> Result<String, ComputeError> {
    let mut lines = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        lines.push(to_json(outcome, false)?);
    }
    Ok(lines.join("\n") + "\n")
}
