//! Load a schema model declaration from disk.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use devpush_db::{ModelDeclaration, SchemaModel};

/// Read `path` (`.toml` or `.json`) and assemble the declared model.
pub fn load_model(path: &Path) -> Result<SchemaModel> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read model file: {}", path.display()))?;

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    let declaration: ModelDeclaration = match extension.as_deref() {
        Some("toml") => toml::from_str(&text)
            .with_context(|| format!("Invalid TOML model: {}", path.display()))?,
        Some("json") => serde_json::from_str(&text)
            .with_context(|| format!("Invalid JSON model: {}", path.display()))?,
        _ => bail!(
            "Unsupported model file '{}': expected a .toml or .json extension",
            path.display()
        ),
    };

    declaration
        .assemble()
        .with_context(|| format!("Invalid schema model: {}", path.display()))
}
