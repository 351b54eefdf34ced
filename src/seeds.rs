//! Seed file loading
//!
//! The seed file is a JSON array of outer groups. Each group names its key,
//! optionally a listing page to discover children from, and optionally a list
//! of already-known child URLs:
//!
//! ```json
//! [
//!   { "group": "Acme", "url": "https://www.example.com/designers/Acme.html", "children": [] },
//!   { "brand": "Initio", "perfumes": ["https://www.example.com/perfume/Initio/Oud-1.html"] }
//! ]
//! ```
//!
//! The `brand`/`perfumes` spelling is accepted so that designer dumps written
//! by the group discovery mode can be fed straight back in.

use crate::SeedError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// One outer iteration unit from the seed file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSeed {
    /// Group identifier (designer name, subreddit)
    #[serde(alias = "brand", alias = "subreddit")]
    pub group: String,

    /// Listing page to run discovery against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Child URLs known ahead of discovery
    #[serde(default, alias = "perfumes", alias = "posts")]
    pub children: Vec<String>,
}

impl GroupSeed {
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            url: None,
            children: Vec::new(),
        }
    }
}

/// Loads and validates a seed file
pub fn load_seeds(path: &Path) -> Result<Vec<GroupSeed>, SeedError> {
    let content = std::fs::read_to_string(path)?;
    parse_seeds(&content)
}

/// Parses seed JSON and rejects empty or duplicate group keys
pub fn parse_seeds(content: &str) -> Result<Vec<GroupSeed>, SeedError> {
    let seeds: Vec<GroupSeed> = serde_json::from_str(content)?;

    let mut seen = HashSet::new();
    for seed in &seeds {
        if seed.group.trim().is_empty() {
            return Err(SeedError::Invalid("group key cannot be empty".to_string()));
        }
        if !seen.insert(seed.group.as_str()) {
            return Err(SeedError::Invalid(format!(
                "duplicate group '{}'",
                seed.group
            )));
        }
    }

    Ok(seeds)
}

/// Writes a seed file (used by group discovery)
pub fn write_seeds(path: &Path, seeds: &[GroupSeed]) -> Result<(), SeedError> {
    let json = serde_json::to_string_pretty(seeds)?;
    std::fs::write(path, json)?;
    Ok(())
}
