//! Seed the category table.
//!
//! Reads a YAML list of `{name, description?, icon?}` entries and inserts
//! each one. Names that already exist are skipped, so the command can be run
//! repeatedly.

use std::path::Path;

use tracing::{info, warn};

use haat_api::db::{self, CategoryRepository, RepositoryError};
use haat_api::models::CategoryInput;

/// Categories bundled with the binary.
const DEFAULT_CATEGORIES: &str = include_str!("../../seeds/categories.yaml");

/// Outcome of a seeding run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub inserted: usize,
    pub skipped: usize,
}

/// Parse and validate a YAML category list.
///
/// # Errors
///
/// Returns an error for malformed YAML or an entry without a name.
pub fn parse_categories(content: &str) -> Result<Vec<CategoryInput>, Box<dyn std::error::Error>> {
    let entries: Vec<CategoryInput> = serde_yaml::from_str(content)?;
    entries
        .into_iter()
        .enumerate()
        .map(|(i, entry)| {
            entry
                .validate()
                .map_err(|e| Box::<dyn std::error::Error>::from(format!("entry {}: {e}", i + 1)))
        })
        .collect()
}

/// Seed categories from `file_path`, or the bundled list when `None`.
///
/// # Errors
///
/// Returns an error if the database URL is missing, the file cannot be read
/// or parsed, or an insert fails for a reason other than a duplicate name.
pub async fn categories(file_path: Option<&str>) -> Result<SeedSummary, Box<dyn std::error::Error>> {
    let database_url = super::database_url().ok_or("HAAT_DATABASE_URL not set")?;

    let content = match file_path {
        Some(path) => {
            if !Path::new(path).exists() {
                return Err(format!("File not found: {path}").into());
            }
            info!(path = %path, "Loading categories from file");
            tokio::fs::read_to_string(path).await?
        }
        None => DEFAULT_CATEGORIES.to_owned(),
    };

    // Validate everything before touching the database
    let inputs = parse_categories(&content)?;
    info!(count = inputs.len(), "Parsed categories");

    let pool = db::create_pool(&database_url).await?;
    let repo = CategoryRepository::new(&pool);

    let mut summary = SeedSummary::default();
    for input in &inputs {
        match repo.create(input).await {
            Ok(category) => {
                info!(id = %category.id, name = %category.name, "Inserted category");
                summary.inserted += 1;
            }
            Err(RepositoryError::Conflict(_)) => {
                warn!(name = %input.name, "Category exists, skipping");
                summary.skipped += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!("Seeding complete!");
    info!("  Inserted: {}", summary.inserted);
    info!("  Skipped (already exist): {}", summary.skipped);
    Ok(summary)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_categories_are_valid() {
        let inputs = parse_categories(DEFAULT_CATEGORIES).unwrap();
        assert!(!inputs.is_empty());
        assert!(inputs.iter().all(|c| !c.name.is_empty()));
    }

    #[test]
    fn test_parse_trims_and_rejects_blank_names() {
        let inputs = parse_categories("- name: ' Pottery '\n  description: ''\n").unwrap();
        assert_eq!(inputs.first().unwrap().name, "Pottery");
        assert_eq!(inputs.first().unwrap().description, None);

        let err = parse_categories("- name: Pottery\n- name: '  '\n").unwrap_err();
        assert!(err.to_string().contains("entry 2"));
    }
}
