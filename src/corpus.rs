//! Corpus Loading
//!
//! Reads the whole schema tree up front into an in-memory cache. All later
//! analysis works on this cache; nothing touches the filesystem again.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::CorpusConfig;
use crate::entity::{EntityRecord, EntityType};
use crate::error::{CheckError, Result};

/// One cached JSON document
#[derive(Debug, Clone)]
pub struct CorpusFile {
    /// Absolute (or root-joined) path on disk
    pub path: PathBuf,
    /// Path relative to the corpus root, used in every diagnostic
    pub relative_path: PathBuf,
    pub document: Value,
}

/// The loaded corpus
#[derive(Debug, Clone)]
pub struct Corpus {
    root: PathBuf,
    /// Keyed by relative path so iteration order is stable
    files: BTreeMap<PathBuf, CorpusFile>,
    dirs: Vec<PathBuf>,
    hash: String,
}

impl Corpus {
    /// Load every `.json` file under `root`
    ///
    /// Unparseable files are collected and reported together; any of them
    /// makes the load fail.
    pub fn load(root: &Path, config: &CorpusConfig) -> Result<Self> {
        if !root.is_dir() {
            return Err(CheckError::MissingFile(root.to_path_buf()));
        }

        let mut files = BTreeMap::new();
        let mut dirs = Vec::new();
        let mut invalid = Vec::new();

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry?;
            let path = entry.path();
            let relative_path = path.strip_prefix(root).unwrap_or(path).to_path_buf();
            let relative_str = relative_path.to_string_lossy();

            if config.skip_prefixes.iter().any(|p| relative_str.starts_with(p.as_str())) {
                continue;
            }

            if entry.file_type().is_dir() {
                dirs.push(relative_path);
                continue;
            }
            if path.extension().map(|e| e != "json").unwrap_or(true) {
                continue;
            }

            let content = fs::read_to_string(path).map_err(|source| CheckError::Read {
                path: path.to_path_buf(),
                source,
            })?;

            match serde_json::from_str::<Value>(&content) {
                Ok(document) => {
                    files.insert(
                        relative_path.clone(),
                        CorpusFile {
                            path: path.to_path_buf(),
                            relative_path,
                            document,
                        },
                    );
                }
                Err(e) => {
                    invalid.push(format!("Invalid JSON in file {}: {}", relative_path.display(), e));
                }
            }
        }

        if !invalid.is_empty() {
            return Err(CheckError::InvalidJson(invalid));
        }

        let hash = fingerprint(files.values());
        info!(
            "Loaded {} files in {} directories from {}",
            files.len(),
            dirs.len(),
            root.display()
        );

        Ok(Self {
            root: root.to_path_buf(),
            files,
            dirs,
            hash,
        })
    }

    /// Build a corpus from in-memory documents (relative path, document)
    pub fn from_documents<I, P>(root: impl Into<PathBuf>, documents: I) -> Self
    where
        I: IntoIterator<Item = (P, Value)>,
        P: Into<PathBuf>,
    {
        let root = root.into();
        let mut files = BTreeMap::new();
        let mut dirs = Vec::new();
        for (rel, document) in documents {
            let relative_path: PathBuf = rel.into();
            for dir in relative_path.ancestors().skip(1) {
                if !dir.as_os_str().is_empty() && !dirs.iter().any(|d: &PathBuf| d == dir) {
                    dirs.push(dir.to_path_buf());
                }
            }
            files.insert(
                relative_path.clone(),
                CorpusFile {
                    path: root.join(&relative_path),
                    relative_path,
                    document,
                },
            );
        }
        let hash = fingerprint(files.values());
        Self { root, files, dirs, hash }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Hex SHA-256 over all file paths and contents
    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn files(&self) -> impl Iterator<Item = &CorpusFile> {
        self.files.values()
    }

    pub fn get(&self, relative_path: &Path) -> Option<&CorpusFile> {
        self.files.get(relative_path)
    }

    /// Whether a directory (relative to the root) was present
    pub fn has_dir(&self, relative_dir: &Path) -> bool {
        self.dirs.iter().any(|d| d == relative_dir)
    }

    /// Files anywhere below `relative_dir`
    pub fn files_in<'a>(&'a self, relative_dir: &'a Path) -> impl Iterator<Item = &'a CorpusFile> + 'a {
        self.files
            .values()
            .filter(move |f| f.relative_path.starts_with(relative_dir) && f.relative_path != relative_dir)
    }

    /// Decode every document of one entity type
    pub fn records(&self, entity_type: EntityType) -> Result<Vec<EntityRecord>> {
        let dir = Path::new(entity_type.dir_name());
        let records = self
            .files_in(dir)
            .map(|f| EntityRecord::from_document(entity_type, &f.relative_path, &f.document))
            .collect::<Result<Vec<_>>>()?;
        debug!("Decoded {} {} records", records.len(), entity_type);
        Ok(records)
    }
}

fn fingerprint<'a>(files: impl Iterator<Item = &'a CorpusFile>) -> String {
    let mut hasher = Sha256::new();
    for file in files {
        hasher.update(file.relative_path.to_string_lossy().as_bytes());
        hasher.update(file.document.to_string().as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_load_classifies_by_directory() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "skills/a.json", r#"{"name": "a"}"#);
        write(tmp.path(), "skills/nested/b.json", r#"{"name": "b", "extends": "a"}"#);
        write(tmp.path(), "objects/record.json", r#"{"name": "record"}"#);
        write(tmp.path(), "README.md", "not json");

        let corpus = Corpus::load(tmp.path(), &CorpusConfig::default()).unwrap();
        assert_eq!(corpus.file_count(), 3);
        assert!(corpus.has_dir(Path::new("skills/nested")));

        let skills = corpus.records(EntityType::Skill).unwrap();
        let names: Vec<_> = skills.iter().filter_map(|r| r.name.as_deref()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(skills[1].source_path, PathBuf::from("skills/nested/b.json"));
    }

    #[test]
    fn test_invalid_json_is_fatal_and_lists_every_file() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "skills/bad1.json", "{");
        write(tmp.path(), "skills/bad2.json", "[1,");
        write(tmp.path(), "skills/ok.json", "{}");

        let err = Corpus::load(tmp.path(), &CorpusConfig::default()).unwrap_err();
        match err {
            CheckError::InvalidJson(files) => {
                assert_eq!(files.len(), 2);
                assert!(files[0].contains("skills/bad1.json"));
            }
            other => panic!("Expected InvalidJson, got {:?}", other),
        }
    }

    #[test]
    fn test_skip_prefixes() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "skills/a.json", "{}");
        write(tmp.path(), "drafts/broken.json", "{");

        let config = CorpusConfig {
            skip_prefixes: vec!["drafts".to_string()],
            ..Default::default()
        };
        let corpus = Corpus::load(tmp.path(), &config).unwrap();
        assert_eq!(corpus.file_count(), 1);
    }

    #[test]
    fn test_in_memory_corpus_registers_every_ancestor_dir() {
        let corpus = Corpus::from_documents("/r", vec![("skills/nlp/x.json", json!({"name": "x"}))]);
        assert!(corpus.has_dir(Path::new("skills")));
        assert!(corpus.has_dir(Path::new("skills/nlp")));
        assert_eq!(corpus.files_in(Path::new("skills")).count(), 1);
    }

    #[test]
    fn test_hash_is_stable() {
        let a = Corpus::from_documents("/r", vec![("skills/a.json", json!({"name": "a"}))]);
        let b = Corpus::from_documents("/r", vec![("skills/a.json", json!({"name": "a"}))]);
        let c = Corpus::from_documents("/r", vec![("skills/a.json", json!({"name": "b"}))]);
        assert_eq!(a.hash(), b.hash());
        assert_ne!(a.hash(), c.hash());
    }
}
