/// Engine configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base URL of the collaborator backend API (default:
    /// `http://localhost:8000/api`).
    pub api_base_url: String,
    /// Directory the file-backed snapshot store writes under
    /// (default: `.fieldwork/sessions`).
    pub store_dir: String,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Whether a failed poll-aggregation call falls back to a
    /// synthesized distribution instead of a pending outcome
    /// (default: `true`).
    pub synthesize_poll_fallback: bool,
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                     |
    /// |--------------------------|-----------------------------|
    /// | `BACKEND_API_URL`        | `http://localhost:8000/api` |
    /// | `SESSION_STORE_DIR`      | `.fieldwork/sessions`       |
    /// | `REQUEST_TIMEOUT_SECS`   | `30`                        |
    /// | `POLL_FALLBACK`          | `true`                      |
    pub fn from_env() -> Self {
        let api_base_url =
            std::env::var("BACKEND_API_URL").unwrap_or_else(|_| "http://localhost:8000/api".into());

        let store_dir =
            std::env::var("SESSION_STORE_DIR").unwrap_or_else(|_| ".fieldwork/sessions".into());

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let synthesize_poll_fallback: bool = std::env::var("POLL_FALLBACK")
            .unwrap_or_else(|_| "true".into())
            .parse()
            .expect("POLL_FALLBACK must be `true` or `false`");

        Self {
            api_base_url,
            store_dir,
            request_timeout_secs,
            synthesize_poll_fallback,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000/api".into(),
            store_dir: ".fieldwork/sessions".into(),
            request_timeout_secs: 30,
            synthesize_poll_fallback: true,
        }
    }
}
