//! Configuration management for the consistency engine
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (oasf-schemas.toml)
//! - Environment variables (OASF_SCHEMAS__*)
//!
//! ## Example config file (oasf-schemas.toml):
//! ```toml
//! [corpus]
//! root = "./schema"
//!
//! [layout]
//! dictionary = "dictionary.json"
//! metaschema_dir = "metaschema"
//!
//! [[entity_types]]
//! entity_type = "skill"
//! sentinel_root = "base_skill"
//! require_extends = true
//!
//! [[protocol]]
//! entity_type = "object"
//! name = "record"
//! proto = "../proto/agntcy/oasf/types/v1/record.proto"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::entity::EntityType;

/// Main configuration for a consistency run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckConfig {
    /// Corpus location and filters
    #[serde(default)]
    pub corpus: CorpusConfig,

    /// Well-known files inside the corpus
    #[serde(default)]
    pub layout: LayoutConfig,

    /// Per entity type overrides
    #[serde(default)]
    pub entity_types: Vec<EntityTypeConfig>,

    /// Proto sync targets
    #[serde(default)]
    pub protocol: Vec<ProtocolTarget>,

    /// Report settings
    #[serde(default)]
    pub report: ReportConfig,
}

/// Corpus configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    /// Path to the schema corpus root
    #[serde(default = "default_corpus_root")]
    pub root: PathBuf,

    /// Skip files whose relative path starts with one of these prefixes
    #[serde(default)]
    pub skip_prefixes: Vec<String>,
}

/// File layout inside the corpus root
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Global attribute dictionary
    #[serde(default = "default_dictionary")]
    pub dictionary: PathBuf,

    /// Directory holding `*.schema.json` meta-schemas
    #[serde(default = "default_metaschema_dir")]
    pub metaschema_dir: PathBuf,

    /// Profile documents (validated against `profile.schema.json`)
    #[serde(default = "default_profiles_dir")]
    pub profiles_dir: PathBuf,

    /// Extension documents (validated against `extension.schema.json`)
    #[serde(default = "default_extensions_dir")]
    pub extensions_dir: PathBuf,
}

/// Overrides for one entity type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityTypeConfig {
    pub entity_type: EntityType,

    /// Name that terminates inheritance (replaces the built-in default)
    #[serde(default)]
    pub sentinel_root: Option<String>,

    /// Every record other than the sentinel root must declare `extends`
    #[serde(default)]
    pub require_extends: bool,
}

/// A resolved entity that must stay in sync with a proto message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolTarget {
    pub entity_type: EntityType,
    /// Entity name (not file name)
    pub name: String,
    /// Path to the `.proto` file, relative to the working directory
    pub proto: PathBuf,
}

/// Report configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Output format (pretty or compact)
    #[serde(default)]
    pub output_format: OutputFormat,

    /// Print warnings even when the run passes
    #[serde(default = "default_true")]
    pub show_warnings: bool,
}

/// Output format for JSON
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,
    Compact,
}

// Default value functions
fn default_corpus_root() -> PathBuf {
    PathBuf::from("schema")
}

fn default_dictionary() -> PathBuf {
    PathBuf::from("dictionary.json")
}

fn default_metaschema_dir() -> PathBuf {
    PathBuf::from("metaschema")
}

fn default_profiles_dir() -> PathBuf {
    PathBuf::from("profiles")
}

fn default_extensions_dir() -> PathBuf {
    PathBuf::from("extensions")
}

fn default_true() -> bool {
    true
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            root: default_corpus_root(),
            skip_prefixes: Vec::new(),
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            dictionary: default_dictionary(),
            metaschema_dir: default_metaschema_dir(),
            profiles_dir: default_profiles_dir(),
            extensions_dir: default_extensions_dir(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::Pretty,
            show_warnings: true,
        }
    }
}

impl CheckConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration from a specific file
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = [
            "oasf-schemas.toml",
            ".oasf-schemas.toml",
            "config/oasf-schemas.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(config_dir) = directories::ProjectDirs::from("org", "agntcy", "oasf-schemas") {
            let xdg_config = config_dir.config_dir().join("oasf-schemas.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // OASF_SCHEMAS__CORPUS__ROOT=... etc.
        builder = builder.add_source(
            Environment::with_prefix("OASF_SCHEMAS")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Get the corpus root (resolves relative paths)
    pub fn corpus_root(&self) -> PathBuf {
        absolutize(&self.corpus.root)
    }

    /// Sentinel root for an entity type, honoring overrides
    pub fn sentinel_root(&self, entity_type: EntityType) -> Option<&str> {
        match self.override_for(entity_type) {
            Some(o) if o.sentinel_root.is_some() => o.sentinel_root.as_deref(),
            _ => entity_type.default_sentinel_root(),
        }
    }

    /// Whether records of this type must declare `extends`
    pub fn require_extends(&self, entity_type: EntityType) -> bool {
        self.override_for(entity_type)
            .map(|o| o.require_extends)
            .unwrap_or(false)
    }

    fn override_for(&self, entity_type: EntityType) -> Option<&EntityTypeConfig> {
        self.entity_types
            .iter()
            .find(|o| o.entity_type == entity_type)
    }
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().unwrap_or_default().join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CheckConfig::default();
        assert_eq!(config.layout.dictionary, PathBuf::from("dictionary.json"));
        assert_eq!(config.sentinel_root(EntityType::Skill), Some("base_skill"));
        assert_eq!(config.sentinel_root(EntityType::Object), None);
        assert!(!config.require_extends(EntityType::Skill));
    }

    #[test]
    fn test_entity_type_override() {
        let config: CheckConfig = toml::from_str(
            r#"
            [[entity_types]]
            entity_type = "skill"
            sentinel_root = "root_skill"
            require_extends = true
            "#,
        )
        .unwrap();

        assert_eq!(config.sentinel_root(EntityType::Skill), Some("root_skill"));
        assert!(config.require_extends(EntityType::Skill));
        assert_eq!(config.sentinel_root(EntityType::Domain), Some("base_domain"));
    }

    #[test]
    fn test_serialize_config() {
        let mut config = CheckConfig::default();
        config.protocol.push(ProtocolTarget {
            entity_type: EntityType::Object,
            name: "record".to_string(),
            proto: PathBuf::from("record.proto"),
        });
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[corpus]"));
        assert!(toml_str.contains("[[protocol]]"));
    }
}
