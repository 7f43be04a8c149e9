//! Platform configuration
//!
//! Everything is read from the environment. Prices are configured in major
//! currency units; gateway orders are created in minor units (paise).

use std::time::Duration;

use wf_common::env::{env_flag, env_opt, env_or, env_or_parse};

use crate::domain::Quote;
use crate::error::{PlatformError, Result};

/// Course pricing and the single configured coupon.
#[derive(Debug, Clone)]
pub struct PricingConfig {
    pub course_price: i64,
    pub discount_price: i64,
    pub coupon_code: String,
    pub currency: String,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            course_price: 399,
            discount_price: 299,
            coupon_code: "TOP100".to_string(),
            currency: "INR".to_string(),
        }
    }
}

impl PricingConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            course_price: env_or_parse("WF_COURSE_PRICE", defaults.course_price),
            discount_price: env_or_parse("WF_DISCOUNT_PRICE", defaults.discount_price),
            coupon_code: env_or("WF_COUPON_CODE", &defaults.coupon_code),
            currency: env_or("WF_CURRENCY", &defaults.currency),
        }
    }

    /// Coupon codes match case-insensitively; anything else pays full price.
    pub fn quote(&self, coupon: Option<&str>) -> Quote {
        let matched = coupon
            .map(str::trim)
            .filter(|code| !code.is_empty() && code.eq_ignore_ascii_case(&self.coupon_code));

        match matched {
            Some(_) => Quote {
                original_price: self.course_price,
                discount: self.course_price - self.discount_price,
                final_price: self.discount_price,
                coupon_applied: Some(self.coupon_code.clone()),
            },
            None => Quote {
                original_price: self.course_price,
                discount: 0,
                final_price: self.course_price,
                coupon_applied: None,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct RazorpayConfig {
    pub key_id: String,
    pub key_secret: String,
    pub api_url: String,
}

impl RazorpayConfig {
    /// `None` when the key pair is not configured.
    pub fn from_env() -> Option<Self> {
        Some(Self {
            key_id: env_opt("RAZORPAY_KEY_ID")?,
            key_secret: env_opt("RAZORPAY_KEY_SECRET")?,
            api_url: env_or("RAZORPAY_API_URL", "https://api.razorpay.com"),
        })
    }
}

/// Identity token verification settings.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    /// HS256 shared secret
    pub secret: Option<String>,
    /// RS256 public key PEM
    pub public_key_pem: Option<String>,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

impl AuthConfig {
    pub fn from_env() -> Result<Self> {
        let public_key_pem = match env_opt("WF_AUTH_PUBLIC_KEY_PATH") {
            Some(path) => Some(std::fs::read_to_string(&path).map_err(|e| {
                PlatformError::configuration(format!("Cannot read public key {}: {}", path, e))
            })?),
            None => None,
        };

        let config = Self {
            secret: env_opt("WF_AUTH_SECRET"),
            public_key_pem,
            issuer: env_opt("WF_AUTH_ISSUER"),
            audience: env_opt("WF_AUTH_AUDIENCE"),
        };

        if config.secret.is_none() && config.public_key_pem.is_none() {
            return Err(PlatformError::configuration(
                "Either WF_AUTH_SECRET or WF_AUTH_PUBLIC_KEY_PATH must be set",
            ));
        }
        Ok(config)
    }

    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: Some(secret.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Local,
    Gcs,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub local_path: String,
    pub bucket: Option<String>,
    pub public_base_url: String,
    pub max_upload_bytes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            local_path: "./data/documents".to_string(),
            bucket: None,
            public_base_url: "http://localhost:3000/files".to_string(),
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

impl StorageConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let backend = match env_or("WF_STORAGE_BACKEND", "local").to_ascii_lowercase().as_str() {
            "memory" => StorageBackend::Memory,
            "local" => StorageBackend::Local,
            "gcs" => StorageBackend::Gcs,
            other => {
                return Err(PlatformError::configuration(format!(
                    "Unknown storage backend: {}. Use memory, local or gcs",
                    other
                )))
            }
        };

        Ok(Self {
            backend,
            local_path: env_or("WF_STORAGE_PATH", &defaults.local_path),
            bucket: env_opt("WF_STORAGE_BUCKET"),
            public_base_url: env_or("WF_STORAGE_PUBLIC_URL", &defaults.public_base_url),
            max_upload_bytes: env_or_parse("WF_MAX_UPLOAD_BYTES", defaults.max_upload_bytes),
        })
    }
}

#[derive(Debug, Clone)]
pub struct RetentionConfig {
    pub enabled: bool,
    pub rejected_after_days: i64,
    pub interval: Duration,
    pub batch_size: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rejected_after_days: 30,
            interval: Duration::from_secs(86_400),
            batch_size: 100,
        }
    }
}

impl RetentionConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enabled: env_flag("WF_RETENTION_ENABLED", defaults.enabled),
            rejected_after_days: env_or_parse("WF_RETENTION_DAYS", defaults.rejected_after_days),
            interval: Duration::from_secs(env_or_parse("WF_RETENTION_INTERVAL_SECS", 86_400)),
            batch_size: env_or_parse("WF_RETENTION_BATCH", defaults.batch_size),
        }
    }
}

/// Full platform configuration.
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    pub pricing: PricingConfig,
    pub razorpay: Option<RazorpayConfig>,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    pub retention: RetentionConfig,
    /// Granted the admin claim once at startup if no administrator exists yet
    pub bootstrap_admin_uid: Option<String>,
    pub environment: String,
}

impl PlatformConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            pricing: PricingConfig::from_env(),
            razorpay: RazorpayConfig::from_env(),
            auth: AuthConfig::from_env()?,
            storage: StorageConfig::from_env()?,
            retention: RetentionConfig::from_env(),
            bootstrap_admin_uid: env_opt("WF_BOOTSTRAP_ADMIN_UID"),
            environment: env_or("WF_ENVIRONMENT", "development"),
        })
    }
}
