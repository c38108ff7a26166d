/// Question and section ids are opaque strings assigned by the
/// collaborator backend (UUIDs in practice, never parsed locally).
pub type QuestionId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Snapshot timestamps are stored as milliseconds since the Unix epoch so
/// the serialized form stays a plain JSON number.
pub type EpochMillis = i64;
