//! Format-preserving Cargo.toml editing for ephemeral version pins.
//!
//! Comments, ordering and whitespace survive the rewrite, and the original
//! text is kept so the manifest can be restored after publishing.

use crate::error::BackendError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use toml_edit::{DocumentMut, Item, Value};

const DEPENDENCY_SECTIONS: [&str; 3] = ["dependencies", "dev-dependencies", "build-dependencies"];

/// Format-preserving TOML editor for Cargo.toml files
#[derive(Debug)]
pub struct TomlEditor {
    /// Path to the TOML file being edited
    file_path: PathBuf,
    /// Parsed TOML document
    document: DocumentMut,
    /// Original file content for restore
    original_content: String,
}

impl TomlEditor {
    /// Open a TOML file for editing
    pub fn open<P: AsRef<Path>>(file_path: P) -> Result<Self, BackendError> {
        let file_path = file_path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&file_path).map_err(|e| BackendError::PinFailed {
            path: file_path.clone(),
            reason: format!("Failed to read: {}", e),
        })?;
        Self::parse(file_path, content)
    }

    fn parse(file_path: PathBuf, content: String) -> Result<Self, BackendError> {
        let document = content
            .parse::<DocumentMut>()
            .map_err(|e| BackendError::PinFailed {
                path: file_path.clone(),
                reason: format!("Failed to parse TOML: {}", e),
            })?;

        Ok(Self {
            file_path,
            document,
            original_content: content,
        })
    }

    /// Set `[package].version`, leaving workspace-inherited versions alone
    pub fn set_package_version(&mut self, version: &str) -> Result<(), BackendError> {
        let package_table = self
            .document
            .get_mut("package")
            .and_then(|item| item.as_table_mut())
            .ok_or_else(|| BackendError::PinFailed {
                path: self.file_path.clone(),
                reason: "No [package] section found".to_string(),
            })?;

        match package_table.get_mut("version") {
            Some(Item::Value(Value::String(formatted))) => {
                replace_preserving_decor(formatted, version);
            }
            // version.workspace = true, in either spelling
            Some(Item::Value(Value::InlineTable(table))) if table.contains_key("workspace") => {}
            Some(Item::Table(table)) if table.contains_key("workspace") => {}
            Some(_) => {
                return Err(BackendError::PinFailed {
                    path: self.file_path.clone(),
                    reason: "Version field has unexpected format".to_string(),
                });
            }
            None => {
                package_table.insert("version", toml_edit::value(version));
            }
        }

        Ok(())
    }

    /// Pin an internal dependency to an exact version in every dependency section
    ///
    /// Returns whether the dependency was found anywhere.
    pub fn pin_dependency(&mut self, dependency_name: &str, version: &str) -> Result<bool, BackendError> {
        let requirement = format!("={}", version);
        let mut found = false;

        for section in DEPENDENCY_SECTIONS {
            let Some(table) = self
                .document
                .get_mut(section)
                .and_then(|item| item.as_table_like_mut())
            else {
                continue;
            };

            if let Some(item) = table.get_mut(dependency_name) {
                Self::pin_item(item, &requirement, &self.file_path)?;
                found = true;
            }
        }

        Ok(found)
    }

    fn pin_item(item: &mut Item, requirement: &str, file_path: &Path) -> Result<(), BackendError> {
        match item {
            Item::Value(Value::String(version_ref)) => {
                replace_preserving_decor(version_ref, requirement);
            }
            Item::Value(Value::InlineTable(table)) => {
                if table.contains_key("workspace") {
                    return Ok(());
                }
                match table.get_mut("version") {
                    Some(Value::String(version_ref)) => replace_preserving_decor(version_ref, requirement),
                    _ => {
                        table.insert("version", Value::from(requirement));
                    }
                }
            }
            Item::Table(table) => {
                if table.contains_key("workspace") {
                    return Ok(());
                }
                match table.get_mut("version") {
                    Some(Item::Value(Value::String(version_ref))) => {
                        replace_preserving_decor(version_ref, requirement)
                    }
                    _ => {
                        table.insert("version", toml_edit::value(requirement));
                    }
                }
            }
            _ => {
                return Err(BackendError::PinFailed {
                    path: file_path.to_path_buf(),
                    reason: format!("Unexpected dependency format: {}", item),
                });
            }
        }
        Ok(())
    }

    /// Apply a package version and a set of dependency pins in one pass
    pub fn apply_pins(
        &mut self,
        own_version: &str,
        dependencies: &BTreeMap<String, String>,
    ) -> Result<(), BackendError> {
        self.set_package_version(own_version)?;
        for (name, version) in dependencies {
            // Declared spelling first, then the other separator
            if !self.pin_dependency(name, version)? {
                let respelled = if name.contains('_') {
                    name.replace('_', "-")
                } else {
                    name.replace('-', "_")
                };
                if !self.pin_dependency(&respelled, version)? {
                    log::debug!(
                        "{}: internal dependency '{}' not declared, nothing to pin",
                        self.file_path.display(),
                        name
                    );
                }
            }
        }
        Ok(())
    }

    /// Write the edited document back to disk
    pub fn save(&self) -> Result<(), BackendError> {
        std::fs::write(&self.file_path, self.document.to_string()).map_err(|e| BackendError::PinFailed {
            path: self.file_path.clone(),
            reason: format!("Failed to write: {}", e),
        })
    }

    /// Content as read from disk before any edit
    pub fn original_content(&self) -> &str {
        &self.original_content
    }

    /// Current rendered document
    pub fn render(&self) -> String {
        self.document.to_string()
    }
}

/// Swap a string value while keeping its surrounding whitespace and comments
fn replace_preserving_decor(formatted: &mut toml_edit::Formatted<String>, value: &str) {
    let decor = formatted.decor().clone();
    let mut replacement = toml_edit::Formatted::new(value.to_string());
    *replacement.decor_mut() = decor;
    *formatted = replacement;
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"[package]
name = "app"
version = "0.1.0" # bumped by releasekit

[dependencies]
core = { path = "../core", version = "0.1" }
util = "0.3"
serde = "1"

[dev-dependencies.core_test]
path = "../core-test"
"#;

    fn editor(content: &str) -> TomlEditor {
        TomlEditor::parse(PathBuf::from("Cargo.toml"), content.to_string()).expect("valid toml")
    }

    #[test]
    fn pins_own_and_internal_versions() {
        let mut editor = editor(MANIFEST);
        let deps = BTreeMap::from([
            ("core".to_string(), "0.2.0".to_string()),
            ("util".to_string(), "0.3.1".to_string()),
            ("core-test".to_string(), "0.2.0".to_string()),
        ]);

        editor.apply_pins("0.2.0", &deps).expect("pins apply");
        let rendered = editor.render();

        assert!(rendered.contains(r#"version = "0.2.0" # bumped by releasekit"#));
        assert!(rendered.contains(r#"core = { path = "../core", version = "=0.2.0" }"#));
        assert!(rendered.contains(r#"util = "=0.3.1""#));
        assert!(rendered.contains(r#"serde = "1""#));
        assert!(rendered.contains("[dev-dependencies.core_test]"));
        assert!(rendered.contains(r#"version = "=0.2.0""#));
        assert_eq!(editor.original_content(), MANIFEST);
    }

    #[test]
    fn underscored_pin_finds_hyphenated_key() {
        let mut editor = editor("[package]\nname = \"app\"\nversion = \"0.1.0\"\n\n[dependencies]\nserde-core = \"0.1\"\n");
        let deps = BTreeMap::from([("serde_core".to_string(), "0.2.0".to_string())]);

        editor.apply_pins("0.2.0", &deps).expect("pins apply");
        assert!(editor.render().contains(r#"serde-core = "=0.2.0""#));
    }

    #[test]
    fn workspace_inherited_version_is_untouched() {
        let mut editor = editor("[package]\nname = \"a\"\nversion.workspace = true\n");
        editor.set_package_version("9.9.9").expect("inherited version");
        assert!(!editor.render().contains("9.9.9"));
    }

    #[test]
    fn missing_package_section_fails() {
        let mut editor = editor("[workspace]\nmembers = []\n");
        assert!(editor.set_package_version("1.0.0").is_err());
    }
}
