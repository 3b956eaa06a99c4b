/// Framework configuration
///
/// Tuning knobs for one framework instance. Construct programmatically
/// with [`FrameworkConfig::new`] or load from the environment with
/// [`FrameworkConfig::from_env`].
///
/// # Environment Variables
///
/// - `TASKPROC_FRAMEWORK_NAME`: framework name (required)
/// - `TASKPROC_FRAMEWORK_ROLE`: allocation role (default: `*`)
/// - `TASKPROC_USER`: unix user tasks run as (default: `root`)
/// - `TASKPROC_POOL`: placement pool filter (default: unset)
/// - `TASKPROC_STAGING_TIMEOUT_S`: stuck-task threshold (default: 240)
/// - `TASKPROC_SUPPRESS_AFTER_S`: idle time before offers are
///   suppressed (default: 30)
/// - `TASKPROC_REAPER_INTERVAL_S`: reaper wake-up interval (default: 10)
/// - `TASKPROC_OFFER_REFUSE_S`: decline filter refuse time (default: 5)
/// - `TASKPROC_PRINCIPAL`: authentication principal (default:
///   `taskproc`)
/// - `TASKPROC_CREDENTIAL_SECRET_FILE`: path to the secret file
///   (default: unset)
use std::env;
use std::path::PathBuf;

/// Blacklist duration applied to agents hosting stuck tasks
pub const STUCK_TASK_BLACKLIST_TIMEOUT_S: f64 = 900.0;

/// Tuning knobs for one framework instance
#[derive(Debug, Clone, PartialEq)]
pub struct FrameworkConfig {
    /// Framework name shown by the master
    pub name: String,

    /// Allocation role offers and launches are tagged with
    pub role: String,

    /// Unix user tasks run as
    pub user: String,

    /// Placement pool; when set, offers lacking a matching `pool`
    /// attribute are declined
    pub pool: Option<String>,

    /// Seconds a task may sit in TASK_STAGING before the reaper kills it
    pub task_staging_timeout_s: f64,

    /// Seconds without a launching offer before offers are suppressed
    pub suppress_after_s: f64,

    /// Reaper wake-up interval in seconds
    pub reaper_interval_s: f64,

    /// Refuse time attached to offer declines
    pub offer_refuse_seconds: f64,

    /// Authentication principal
    pub principal: String,

    /// Optional path to the credential secret file
    pub credential_secret_file: Option<PathBuf>,
}

impl FrameworkConfig {
    /// Creates a config with default tuning for the given identity
    pub fn new(name: impl Into<String>, role: impl Into<String>) -> Self {
        FrameworkConfig {
            name: name.into(),
            role: role.into(),
            user: "root".to_string(),
            pool: None,
            task_staging_timeout_s: 240.0,
            suppress_after_s: 30.0,
            reaper_interval_s: 10.0,
            offer_refuse_seconds: 5.0,
            principal: "taskproc".to_string(),
            credential_secret_file: None,
        }
    }

    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if `TASKPROC_FRAMEWORK_NAME` is missing or a
    /// numeric knob fails to parse.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        let name = env::var("TASKPROC_FRAMEWORK_NAME")
            .map_err(|_| anyhow::anyhow!("TASKPROC_FRAMEWORK_NAME environment variable is required"))?;
        let role = env::var("TASKPROC_FRAMEWORK_ROLE").unwrap_or_else(|_| "*".to_string());

        let mut config = FrameworkConfig::new(name, role);

        if let Ok(user) = env::var("TASKPROC_USER") {
            config.user = user;
        }
        if let Ok(pool) = env::var("TASKPROC_POOL") {
            config.pool = Some(pool);
        }
        if let Ok(principal) = env::var("TASKPROC_PRINCIPAL") {
            config.principal = principal;
        }
        if let Ok(path) = env::var("TASKPROC_CREDENTIAL_SECRET_FILE") {
            config.credential_secret_file = Some(PathBuf::from(path));
        }

        config.task_staging_timeout_s =
            parse_secs("TASKPROC_STAGING_TIMEOUT_S", config.task_staging_timeout_s)?;
        config.suppress_after_s = parse_secs("TASKPROC_SUPPRESS_AFTER_S", config.suppress_after_s)?;
        config.reaper_interval_s = parse_secs("TASKPROC_REAPER_INTERVAL_S", config.reaper_interval_s)?;
        config.offer_refuse_seconds = parse_secs("TASKPROC_OFFER_REFUSE_S", config.offer_refuse_seconds)?;

        Ok(config)
    }
}

fn parse_secs(var: &str, default: f64) -> anyhow::Result<f64> {
    match env::var(var) {
        Ok(raw) => raw
            .parse::<f64>()
            .map_err(|_| anyhow::anyhow!("{var} must be a number of seconds, got {raw:?}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FrameworkConfig::new("fake_name", "fake_role");
        assert_eq!(config.name, "fake_name");
        assert_eq!(config.role, "fake_role");
        assert_eq!(config.pool, None);
        assert_eq!(config.task_staging_timeout_s, 240.0);
        assert_eq!(config.suppress_after_s, 30.0);
        assert_eq!(config.offer_refuse_seconds, 5.0);
        assert_eq!(config.principal, "taskproc");
        assert_eq!(config.credential_secret_file, None);
    }
}
