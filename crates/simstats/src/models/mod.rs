pub mod envelope;
pub mod request;

pub use envelope::{ENVELOPE_SCHEMA_VERSION, ReportEnvelope, ReportEnvelopeFailure};
pub use request::{ReportQuery, ReportRequest, request_json_schema};
