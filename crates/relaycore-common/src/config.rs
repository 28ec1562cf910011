//! Application configuration loaded from environment variables and config files.
//!
//! Supports `.env` files for development and environment variables for production.
//! Config precedence: env vars > .env file > config.toml > defaults

use serde::Deserialize;
use std::sync::OnceLock;

static CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Get the global application configuration.
///
/// # Panics
/// Panics if config has not been initialized via [`init`].
pub fn get() -> &'static AppConfig {
    CONFIG
        .get()
        .expect("config not initialized. Call relaycore_common::config::init() first.")
}

/// Initialize the global configuration from environment.
///
/// Should be called once at application startup, before any other code accesses config.
pub fn init() -> Result<&'static AppConfig, config::ConfigError> {
    // Load .env file if present (development)
    let _ = dotenvy::dotenv();

    let cfg = config::Config::builder()
        // Defaults
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 8080)?
        .set_default("database.url", "sqlite://./data/relaycore.db")?
        .set_default("database.max_connections", 20)?
        .set_default("database.min_connections", 5)?
        .set_default("database.busy_timeout_secs", 5)?
        .set_default("hmac.secret", "")?
        .set_default("hmac.account_key_hex", "")?
        .set_default("opaque.server_id", "")?
        .set_default("accounts.token_len_bytes", 32)?
        .set_default("accounts.token_len_bytes_max", 64)?
        .set_default("limits.visible_message_limit", 200)?
        .set_default("limits.visible_message_iteration_cap", 5)?
        .set_default("limits.contact_secret_backup_retain", 5)?
        .set_default("invites.window_secs", 300)?
        .set_default("calls.cleanup_throttle_secs", 60)?
        // Optional config file
        .add_source(config::File::with_name("config").required(false))
        // Environment variables (RELAYCORE__SERVER__HOST, RELAYCORE__DATABASE__URL, etc.)
        .add_source(
            config::Environment::with_prefix("RELAYCORE")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let app_config: AppConfig = cfg.try_deserialize()?;
    Ok(CONFIG.get_or_init(|| app_config))
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub hmac: HmacConfig,
    pub opaque: OpaqueConfig,
    pub accounts: AccountsConfig,
    pub limits: LimitsConfig,
    pub invites: InvitesConfig,
    pub calls: CallsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// SQLite connection URL, e.g. `sqlite://./data/relaycore.db` or `sqlite::memory:`
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    /// `PRAGMA busy_timeout` — how long a writer waits on a locked db before erroring.
    pub busy_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HmacConfig {
    /// Shared secret used to admit every request (`x-auth` header HMAC).
    pub secret: String,
    /// 64 hex-char server-side key used to derive `uid_digest = HMAC(key, uid)`.
    pub account_key_hex: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OpaqueConfig {
    /// Opaque pass-through identifier for the OPAQUE protocol's server id.
    /// Never parsed — stored and echoed back verbatim.
    pub server_id: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AccountsConfig {
    /// Default length, in bytes, of a freshly minted account token.
    pub token_len_bytes: usize,
    /// Maximum allowed account token length, in bytes.
    pub token_len_bytes_max: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LimitsConfig {
    /// Hard cap on `limit` for message list reads.
    pub visible_message_limit: i64,
    /// Max raw-row iterations the message reader may perform per request.
    pub visible_message_iteration_cap: u32,
    /// Number of contact-secret backup rows retained per account.
    pub contact_secret_backup_retain: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InvitesConfig {
    /// Invite-dropbox lifetime, in seconds, from creation.
    pub window_secs: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CallsConfig {
    /// Minimum interval, in seconds, between best-effort call-table cleanups.
    pub cleanup_throttle_secs: i64,
}
