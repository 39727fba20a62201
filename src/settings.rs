//! Settings infrastructure for xmlsp.
//!
//! This module loads `settings.toml` files that configure the formatter, and
//! carries the client capability settings consulted by feature requests.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tower_lsp::lsp_types::{self, HoverClientCapabilities};
use tracing::warn;

/// Root settings structure loaded from settings.toml.
#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    /// Formatter configuration.
    pub format: Option<FormattingOptions>,
}

/// Formatting rules applied by the structural formatter.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FormattingOptions {
    /// Width of one indentation level in spaces.
    pub tab_size: u32,
    /// Indent with spaces rather than tabs.
    pub insert_spaces: bool,
    /// Collapse text content onto one line instead of preserving line breaks.
    pub join_content_lines: bool,
    /// Put every attribute after the first on its own line.
    pub split_attributes: bool,
    /// Wrap attributes when an element has more than this many.
    pub max_inline_attributes: Option<usize>,
    /// Wrap attributes when the start tag would run past this column.
    pub max_line_width: Option<usize>,
    /// Extra indentation levels for wrapped attributes.
    pub split_attributes_indent: usize,
    /// Ensure whole-document output ends with a line break.
    pub insert_final_newline: bool,
}

impl Default for FormattingOptions {
    fn default() -> Self {
        Self {
            tab_size: 2,
            insert_spaces: true,
            join_content_lines: false,
            split_attributes: false,
            max_inline_attributes: None,
            max_line_width: None,
            split_attributes_indent: 2,
            insert_final_newline: false,
        }
    }
}

impl FormattingOptions {
    /// Overlay the options an LSP formatting request carries.
    pub fn with_request_options(&self, request: &lsp_types::FormattingOptions) -> Self {
        Self {
            tab_size: request.tab_size,
            insert_spaces: request.insert_spaces,
            insert_final_newline: request
                .insert_final_newline
                .unwrap_or(self.insert_final_newline),
            ..self.clone()
        }
    }

    /// One level of indentation.
    pub fn indent_unit(&self) -> String {
        if self.insert_spaces {
            " ".repeat(self.tab_size as usize)
        } else {
            "\t".to_string()
        }
    }
}

/// Hover-related client settings.
#[derive(Debug, Clone, Default)]
pub struct HoverSettings {
    /// What the client declared it supports for hover.
    pub capabilities: Option<HoverClientCapabilities>,
}

impl HoverSettings {
    /// Extract hover settings from the client's declared capabilities.
    pub fn from_client_capabilities(capabilities: &lsp_types::ClientCapabilities) -> Self {
        Self {
            capabilities: capabilities
                .text_document
                .as_ref()
                .and_then(|text_document| text_document.hover.clone()),
        }
    }
}

/// Load settings from a settings.toml file.
///
/// Returns default settings if the file doesn't exist or can't be parsed.
pub fn load_settings(path: &Path) -> Settings {
    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(path = %path.display(), "failed to parse settings.toml: {}", e);
                Settings::default()
            }
        },
        Err(_) => Settings::default(),
    }
}

/// Discover settings.toml by searching up the directory tree.
///
/// Returns `(settings, settings_dir)` where `settings_dir` is the directory
/// containing the found settings.toml. If not found, returns
/// `(Settings::default(), start_dir)`.
pub fn discover_settings(start_dir: &Path) -> (Settings, PathBuf) {
    let mut current = Some(start_dir);
    while let Some(dir) = current {
        let candidate = dir.join("settings.toml");
        if candidate.is_file() {
            return (load_settings(&candidate), dir.to_path_buf());
        }
        current = dir.parent();
    }

    (Settings::default(), start_dir.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_format_section() {
        let settings: Settings = toml::from_str(
            r#"
            [format]
            tab_size = 4
            split_attributes = true
            max_inline_attributes = 3
            "#,
        )
        .unwrap();
        let format = settings.format.unwrap();
        assert_eq!(format.tab_size, 4);
        assert!(format.split_attributes);
        assert_eq!(format.max_inline_attributes, Some(3));
        assert!(format.insert_spaces);
        assert_eq!(format.split_attributes_indent, 2);
    }

    #[test]
    fn empty_settings() {
        let settings: Settings = toml::from_str("").unwrap();
        assert!(settings.format.is_none());
    }

    #[test]
    fn request_options_override_file_settings() {
        let file = FormattingOptions {
            join_content_lines: true,
            insert_final_newline: true,
            ..Default::default()
        };
        let request = lsp_types::FormattingOptions {
            tab_size: 8,
            insert_spaces: false,
            ..Default::default()
        };
        let merged = file.with_request_options(&request);
        assert_eq!(merged.tab_size, 8);
        assert!(!merged.insert_spaces);
        assert!(merged.join_content_lines);
        assert!(merged.insert_final_newline);
        assert_eq!(merged.indent_unit(), "\t");
    }

    #[test]
    fn load_missing_file_is_default() {
        let settings = load_settings(Path::new("/nonexistent/settings.toml"));
        assert!(settings.format.is_none());
    }

    #[test]
    fn discover_walks_up() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(
            root.path().join("settings.toml"),
            "[format]\ntab_size = 3\n",
        )
        .unwrap();
        let nested = root.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();

        let (settings, dir) = discover_settings(&nested);
        assert_eq!(dir, root.path());
        assert_eq!(settings.format.unwrap().tab_size, 3);
    }

    #[test]
    fn malformed_settings_fall_back_to_default() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("settings.toml");
        std::fs::write(&path, "[format\n").unwrap();
        assert!(load_settings(&path).format.is_none());
    }
}
