use std::time::Duration;

/// Endpoint that creates a new resumable upload session.
pub const DEFAULT_INITIATION_URL: &str = "https://www.googleapis.com/upload/youtube/v3/videos?uploadType=resumable&part=snippet,status,contentDetails";

/// Declares the byte length of the payload that will follow at the session URL.
pub const HEADER_UPLOAD_CONTENT_LENGTH: &str = "X-Upload-Content-Length";

/// Declares the MIME type of the payload that will follow at the session URL.
pub const HEADER_UPLOAD_CONTENT_TYPE: &str = "X-Upload-Content-Type";

/// Content type of the metadata body sent with the initiation request.
pub const METADATA_CONTENT_TYPE: &str = "application/json; charset=UTF-8";

/// Content type assumed when a state record does not name one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Status the service uses for "resume incomplete".
///
/// Probe replies carry the confirmed range with this status, and an upload
/// PUT answered with it did not complete the payload.
pub const STATUS_RESUME_INCOMPLETE: u16 = 308;

/// How often the progress monitor probes the session URL.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(5);

/// Sentinel retry budget meaning "retry forever".
pub const RETRY_UNLIMITED: i64 = -1;

/// Error reasons the service uses for rejected credentials.
pub const AUTH_ERROR_REASONS: &[&str] = &["authError", "invalidCredentials", "unauthorized"];
