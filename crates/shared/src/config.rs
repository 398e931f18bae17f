//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// JWT configuration.
    pub jwt: JwtSettings,
    /// Payment gateway configuration.
    pub gateway: GatewayConfig,
    /// Reconciliation sweeper configuration.
    #[serde(default)]
    pub sweeper: SweeperConfig,
    /// Per-user payment limits.
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Outbound notification configuration.
    pub notifications: NotificationConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// JWT configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtSettings {
    /// Secret key shared with the identity provider.
    pub secret: String,
    /// Access token expiration in seconds (used when minting test tokens).
    #[serde(default = "default_access_token_expiry")]
    pub access_token_expiry_secs: u64,
}

fn default_access_token_expiry() -> u64 {
    900 // 15 minutes
}

/// Payment gateway (push-payment provider) configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Base URL of the provider API.
    pub base_url: String,
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// Shared secret used to verify webhook signatures.
    pub webhook_secret: String,
    /// Request timeout in seconds.
    #[serde(default = "default_gateway_timeout")]
    pub timeout_secs: u64,
    /// Smallest amount (in minor units) the provider accepts.
    #[serde(default = "default_min_amount")]
    pub min_amount: u64,
    /// Largest amount (in minor units) the provider accepts.
    #[serde(default = "default_max_amount")]
    pub max_amount: u64,
    /// ISO 4217 currency code sent to the provider.
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_gateway_timeout() -> u64 {
    10
}

fn default_min_amount() -> u64 {
    500
}

fn default_max_amount() -> u64 {
    5_000_000
}

fn default_currency() -> String {
    "UGX".to_string()
}

/// Reconciliation sweeper configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SweeperConfig {
    /// Interval between reconciliation runs, in seconds.
    #[serde(default = "default_sweep_interval")]
    pub interval_secs: u64,
    /// Age after which a non-terminal entry is considered stale.
    #[serde(default = "default_stale_threshold")]
    pub stale_threshold_secs: u64,
    /// Age after which an entry with no provider reference is failed.
    #[serde(default = "default_no_ref_grace")]
    pub no_ref_grace_secs: u64,
    /// Maximum ambiguous polls before an entry is forced to failed.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Days a failed entry is retained before being archived.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_stale_threshold() -> u64 {
    300
}

fn default_no_ref_grace() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    5
}

fn default_retention_days() -> u32 {
    7
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_sweep_interval(),
            stale_threshold_secs: default_stale_threshold(),
            no_ref_grace_secs: default_no_ref_grace(),
            max_retries: default_max_retries(),
            retention_days: default_retention_days(),
        }
    }
}

/// Per-user payment limits.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Maximum number of non-terminal entries a user may have at once.
    #[serde(default = "default_max_pending")]
    pub max_pending_entries: u64,
    /// Largest single withdrawal a user may request (minor units).
    #[serde(default = "default_max_withdrawal")]
    pub max_withdrawal_amount: u64,
}

fn default_max_pending() -> u64 {
    3
}

fn default_max_withdrawal() -> u64 {
    2_000_000
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_pending_entries: default_max_pending(),
            max_withdrawal_amount: default_max_withdrawal(),
        }
    }
}

/// Outbound notification (SMTP) configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    /// Whether notifications are sent at all.
    #[serde(default)]
    pub enabled: bool,
    /// SMTP relay host.
    pub smtp_host: String,
    /// SMTP relay port.
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    /// SMTP username.
    pub smtp_username: String,
    /// SMTP password.
    pub smtp_password: String,
    /// From address for outbound mail.
    pub from_email: String,
    /// Display name for outbound mail.
    #[serde(default = "default_from_name")]
    pub from_name: String,
}

fn default_smtp_port() -> u16 {
    587
}

fn default_from_name() -> String {
    "Kavera".to_string()
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("KAVERA").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
