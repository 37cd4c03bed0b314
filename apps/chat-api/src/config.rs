/// Chat API configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string.
    pub database_url: String,
    /// HMAC secret used to verify credential tokens.
    pub jwt_secret: String,
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Snowflake worker id for message ids.
    pub worker_id: u16,
    /// Messages returned to a client joining a room.
    pub room_backfill_limit: i64,
    pub history_default_limit: i64,
    pub history_max_limit: i64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Panics with a descriptive message if a required variable is missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_var("DATABASE_URL"),
            jwt_secret: required_var("JWT_SECRET"),
            port: parsed_var("PORT", 4000),
            worker_id: parsed_var("WORKER_ID", 0),
            room_backfill_limit: parsed_var("ROOM_BACKFILL_LIMIT", 50),
            history_default_limit: parsed_var("HISTORY_DEFAULT_LIMIT", 50),
            history_max_limit: parsed_var("HISTORY_MAX_LIMIT", 200),
        }
    }
}

fn required_var(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| panic!("{name} env var is required"))
}

fn parsed_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
