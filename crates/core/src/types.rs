/// Job identifiers are opaque strings assigned by the image backend.
pub type JobId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
