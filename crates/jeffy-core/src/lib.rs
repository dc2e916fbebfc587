pub mod app_config;
pub mod catalog;
mod config;
pub mod domain;
pub mod export;
pub mod pricing;
pub mod referral;
pub mod stock;

pub use app_config::{AppConfig, Environment};
pub use catalog::{load_catalog, slug_from_name, CatalogFile};
pub use config::{load_app_config, load_app_config_from_env};
pub use pricing::{calculate_cost_breakdown, CostBreakdown, CostInputs};

use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read catalog file {path}: {source}")]
    CatalogFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse catalog file: {0}")]
    CatalogFileParse(#[from] serde_yaml::Error),

    #[error("catalog validation failed: {0}")]
    Validation(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("unknown {kind} '{value}'")]
    UnknownStatus { kind: &'static str, value: String },

    #[error("invalid {kind} transition from '{from}' to '{to}'")]
    InvalidTransition {
        kind: &'static str,
        from: String,
        to: String,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PricingError {
    #[error("invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReferralError {
    #[error("referral campaign is not active")]
    Inactive,

    #[error("referral campaign has not started yet")]
    NotStarted,

    #[error("referral campaign has expired")]
    Expired,

    #[error("order total is below the campaign minimum of {minimum}")]
    BelowMinimum { minimum: Decimal },

    #[error("referral campaign has reached its redemption limit")]
    Exhausted,

    #[error("invalid campaign terms: {0}")]
    InvalidTerms(String),
}
