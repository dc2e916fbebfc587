use std::path::Path;

use super::*;

fn distributor(name: &str) -> DistributorConfig {
    DistributorConfig {
        name: name.to_string(),
        country: Some("CN".to_string()),
        contact_email: None,
        contact_phone: None,
        lead_time_days: 21,
        notes: None,
    }
}

#[test]
fn slug_simple_name() {
    assert_eq!(slug_from_name("Home Appliances"), "home-appliances");
}

#[test]
fn slug_special_characters() {
    assert_eq!(slug_from_name("Kids' Toys & Games"), "kids-toys-games");
}

#[test]
fn slug_accented_characters() {
    // Non-ASCII chars are stripped; no dash inserted between adjacent ASCII chars
    assert_eq!(slug_from_name("Café Supplies"), "caf-supplies");
}

#[test]
fn slug_collapses_repeated_separators() {
    assert_eq!(slug_from_name("  Big -- Box__Store "), "big-box-store");
}

#[test]
fn validate_rejects_empty_name() {
    let catalog = CatalogFile {
        categories: vec![CategoryConfig {
            name: "  ".to_string(),
            description: None,
        }],
        ..CatalogFile::default()
    };
    let err = validate_catalog(&catalog).unwrap_err();
    assert!(err.to_string().contains("non-empty"));
}

#[test]
fn validate_rejects_duplicate_name_case_insensitive() {
    let catalog = CatalogFile {
        distributors: vec![distributor("Shenzhen Direct"), distributor("shenzhen direct")],
        ..CatalogFile::default()
    };
    let err = validate_catalog(&catalog).unwrap_err();
    assert!(err.to_string().contains("duplicate distributor name"));
}

#[test]
fn validate_rejects_duplicate_slug() {
    let catalog = CatalogFile {
        franchises: vec![
            FranchiseConfig {
                name: "Jeffy Leeds".to_string(),
                city: None,
                contact_email: None,
            },
            FranchiseConfig {
                name: "Jeffy--Leeds".to_string(),
                city: None,
                contact_email: None,
            },
        ],
        ..CatalogFile::default()
    };
    let err = validate_catalog(&catalog).unwrap_err();
    assert!(err.to_string().contains("duplicate franchise slug"));
}

#[test]
fn validate_rejects_negative_lead_time() {
    let mut d = distributor("Late Freight");
    d.lead_time_days = -1;
    let catalog = CatalogFile {
        distributors: vec![d],
        ..CatalogFile::default()
    };
    let err = validate_catalog(&catalog).unwrap_err();
    assert!(err.to_string().contains("negative lead_time_days"));
}

#[test]
fn validate_rejects_bad_country_code() {
    let mut d = distributor("Global Goods");
    d.country = Some("China".to_string());
    let catalog = CatalogFile {
        distributors: vec![d],
        ..CatalogFile::default()
    };
    let err = validate_catalog(&catalog).unwrap_err();
    assert!(err.to_string().contains("invalid country"));
}

#[test]
fn same_name_allowed_across_sections() {
    let catalog = CatalogFile {
        categories: vec![CategoryConfig {
            name: "Outdoor".to_string(),
            description: None,
        }],
        franchises: vec![FranchiseConfig {
            name: "Outdoor".to_string(),
            city: None,
            contact_email: None,
        }],
        distributors: vec![],
    };
    assert!(validate_catalog(&catalog).is_ok());
}

#[test]
fn parses_yaml_with_missing_sections() {
    let yaml = "categories:\n  - name: Kitchen\n";
    let catalog: CatalogFile = serde_yaml::from_str(yaml).expect("parse");
    assert_eq!(catalog.categories.len(), 1);
    assert!(catalog.franchises.is_empty());
    assert!(catalog.distributors.is_empty());
}

#[test]
fn load_catalog_from_real_file() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("config")
        .join("catalog.yaml");
    assert!(
        path.exists(),
        "catalog.yaml missing at {path:?}; required for this test"
    );
    let catalog = load_catalog(&path).expect("failed to load catalog.yaml");
    assert!(!catalog.categories.is_empty());
    assert!(!catalog.franchises.is_empty());
    assert!(!catalog.distributors.is_empty());
}

#[test]
fn load_catalog_missing_file_is_io_error() {
    let err = load_catalog(Path::new("/definitely/not/here.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::CatalogFileIo { .. }));
}
