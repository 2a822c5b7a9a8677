use secrecy::Secret;
use serde::Deserialize;

use crate::models::ShirtSize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub base_url: String,
    pub host: String,
    pub port: u16,

    // Stripe
    pub stripe_secret_key: Option<Secret<String>>,
    pub stripe_webhook_secret: Option<Secret<String>>,
    pub stripe_api_base: String,

    // Shirt pricing (saved price id, inline cents, or one saved price per size)
    pub stripe_tee_price_id: Option<String>,
    pub stripe_tee_price_cents: Option<String>,
    pub stripe_tee_image_url: Option<String>,
    pub stripe_size_price_ids: Vec<(ShirtSize, String)>,

    // Outbound email (SMTP relay)
    pub email_user: Option<String>,
    pub email_pass: Option<Secret<String>>,
    pub smtp_host: String,
    pub admin_email: Option<String>,

    // Payment reconciliation schedule (cron expression, seconds first)
    pub reconcile_cron: Option<String>,

    // Security
    pub session_secret: Secret<String>,
    pub admin_dash_password: Secret<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Load .env file if it exists (for local development)
        let _ = dotenvy::dotenv();

        let config = config::Config::builder()
            .add_source(config::Environment::default().separator("__"))
            .build()?;

        let stripe_size_price_ids = ShirtSize::ALL
            .iter()
            .filter_map(|size| {
                let key = format!("stripe_price_id_{}", size.as_str().to_lowercase());
                config
                    .get::<String>(&key)
                    .ok()
                    .filter(|id| !id.trim().is_empty())
                    .map(|id| (*size, id.trim().to_string()))
            })
            .collect();

        Ok(Self {
            database_url: config.get("database_url")?,
            base_url: config
                .get::<String>("base_url")?
                .trim_end_matches('/')
                .to_string(),
            host: config.get("host").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: config.get("port")?,

            stripe_secret_key: optional_secret(&config, "stripe_secret_key"),
            stripe_webhook_secret: optional_secret(&config, "stripe_webhook_secret"),
            stripe_api_base: config
                .get("stripe_api_base")
                .unwrap_or_else(|_| "https://api.stripe.com".to_string()),

            stripe_tee_price_id: optional_string(&config, "stripe_tee_price_id"),
            stripe_tee_price_cents: optional_string(&config, "stripe_tee_price_cents"),
            stripe_tee_image_url: optional_string(&config, "stripe_tee_image_url"),
            stripe_size_price_ids,

            email_user: optional_string(&config, "email_user"),
            email_pass: optional_secret(&config, "email_pass"),
            smtp_host: config
                .get("smtp_host")
                .unwrap_or_else(|_| "smtp.gmail.com".to_string()),
            admin_email: optional_string(&config, "admin_email"),

            reconcile_cron: optional_string(&config, "reconcile_cron"),

            session_secret: Secret::new(config.get("session_secret")?),
            admin_dash_password: Secret::new(config.get("admin_dash_password")?),
        })
    }

    /// Whether the session cookie should carry the `Secure` attribute
    pub fn cookies_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

fn optional_string(config: &config::Config, key: &str) -> Option<String> {
    config
        .get::<String>(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn optional_secret(config: &config::Config, key: &str) -> Option<Secret<String>> {
    optional_string(config, key).map(Secret::new)
}
