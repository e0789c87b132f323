use std::env;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;

pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub public_site_url: String,
    pub brand_name: String,
    pub admin_email: Option<String>,
    pub paypal: PayPalConfig,
    pub smtp: Option<SmtpConfig>,
}

pub struct PayPalConfig {
    pub client_id: String,
    pub client_secret: String,
    pub base_url: String,
    pub webhook_id: String,
}

pub struct SmtpConfig {
    pub host: String,
    pub username: String,
    pub password: String,
    pub from: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "data/database.json".to_string()),
            public_site_url: env::var("PUBLIC_SITE_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            brand_name: env::var("BRAND_NAME").unwrap_or_else(|_| "Koinonia".to_string()),
            admin_email: env::var("ADMIN_EMAIL").ok().filter(|v| !v.is_empty()),
            paypal: PayPalConfig {
                client_id: env::var("PAYPAL_CLIENT_ID").unwrap_or_default(),
                client_secret: env::var("PAYPAL_CLIENT_SECRET").unwrap_or_default(),
                base_url: env::var("PAYPAL_BASE_URL")
                    .unwrap_or_else(|_| "https://api-m.paypal.com".to_string()),
                webhook_id: env::var("PAYPAL_WEBHOOK_ID").unwrap_or_default(),
            },
            smtp: SmtpConfig::from_env(),
        }
    }
}

impl SmtpConfig {
    fn from_env() -> Option<Self> {
        Some(Self {
            host: env::var("SMTP_HOST").ok()?,
            username: env::var("SMTP_USERNAME").ok()?,
            password: env::var("SMTP_PASSWORD").ok()?,
            from: env::var("SMTP_FROM").ok()?,
        })
    }
}
