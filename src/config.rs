use std::path::Path;

use serde::{Deserialize, Serialize};

/// Server configuration, loadable from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Maximum file size for uploads (in bytes)
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: u64,

    /// File names to hide from listings (OS junk files)
    #[serde(default = "default_hidden_files")]
    pub hidden_files: Vec<String>,
}

fn default_max_upload_size() -> u64 {
    100 * 1024 * 1024 // 100 MB
}

fn default_hidden_files() -> Vec<String> {
    vec![
        ".DS_Store".to_string(),
        ".localized".to_string(),
        ".AppleDouble".to_string(),
        "Thumbs.db".to_string(),
        "desktop.ini".to_string(),
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_upload_size: default_max_upload_size(),
            hidden_files: default_hidden_files(),
        }
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Check if a file name should be hidden from listings
    pub fn is_hidden_name(&self, name: &str) -> bool {
        // Mac resource fork files
        if name.starts_with("._") {
            return true;
        }
        self.hidden_files.iter().any(|f| f.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_hides_os_junk() {
        let config = Config::default();
        assert!(config.is_hidden_name(".DS_Store"));
        assert!(config.is_hidden_name("thumbs.db"));
        assert!(config.is_hidden_name("._photo.jpg"));
        assert!(!config.is_hidden_name("notes.txt"));
        assert!(!config.is_hidden_name(".gitignore"));
    }
}
