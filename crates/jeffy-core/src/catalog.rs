//! Reference-data seed file: categories, franchises and distributors.
//!
//! The file is plain YAML so operators can edit it by hand; `jeffy-cli db seed`
//! upserts every entry keyed by slug.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Generate a URL-safe slug from a display name.
///
/// ASCII alphanumerics are lower-cased and kept, spaces and dashes become
/// single dashes, everything else is dropped.
#[must_use]
pub fn slug_from_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter_map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                Some(c)
            } else if c == ' ' || c == '_' {
                Some('-')
            } else {
                None
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryConfig {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FranchiseConfig {
    pub name: String,
    pub city: Option<String>,
    pub contact_email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributorConfig {
    pub name: String,
    /// ISO 3166 alpha-2 country the distributor ships from.
    pub country: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub lead_time_days: i32,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub categories: Vec<CategoryConfig>,
    #[serde(default)]
    pub franchises: Vec<FranchiseConfig>,
    #[serde(default)]
    pub distributors: Vec<DistributorConfig>,
}

/// Load and validate the catalog seed file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_catalog(path: &Path) -> Result<CatalogFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::CatalogFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let catalog: CatalogFile =
        serde_yaml::from_str(&content).map_err(ConfigError::CatalogFileParse)?;

    validate_catalog(&catalog)?;

    Ok(catalog)
}

fn validate_catalog(catalog: &CatalogFile) -> Result<(), ConfigError> {
    check_unique_names("category", catalog.categories.iter().map(|c| c.name.as_str()))?;
    check_unique_names("franchise", catalog.franchises.iter().map(|f| f.name.as_str()))?;
    check_unique_names(
        "distributor",
        catalog.distributors.iter().map(|d| d.name.as_str()),
    )?;

    for distributor in &catalog.distributors {
        if distributor.lead_time_days < 0 {
            return Err(ConfigError::Validation(format!(
                "distributor '{}' has negative lead_time_days {}",
                distributor.name, distributor.lead_time_days
            )));
        }
        if let Some(country) = &distributor.country {
            if country.len() != 2 || !country.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(ConfigError::Validation(format!(
                    "distributor '{}' has invalid country '{country}'; expected a two-letter code",
                    distributor.name
                )));
            }
        }
    }

    Ok(())
}

fn check_unique_names<'a>(
    kind: &str,
    names: impl Iterator<Item = &'a str>,
) -> Result<(), ConfigError> {
    let mut seen_names = HashSet::new();
    let mut seen_slugs = HashSet::new();

    for name in names {
        if name.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "{kind} name must be non-empty"
            )));
        }

        if !seen_names.insert(name.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate {kind} name: '{name}'"
            )));
        }

        let slug = slug_from_name(name);
        if slug.is_empty() {
            return Err(ConfigError::Validation(format!(
                "{kind} '{name}' produces an empty slug"
            )));
        }
        if !seen_slugs.insert(slug.clone()) {
            return Err(ConfigError::Validation(format!(
                "duplicate {kind} slug: '{slug}' (from '{name}')"
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "catalog_test.rs"]
mod tests;
