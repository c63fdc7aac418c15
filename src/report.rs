//! Diagnostics
//!
//! Every checker returns its own [`Diagnostics`] collection; the caller merges
//! them into a [`RunReport`]. Nothing accumulates in global state.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Diagnostic Codes
// =============================================================================

/// Diagnostic code for categorizing issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticCode {
    // === Meta-schema ===
    /// Document fails its class meta-schema
    SchemaViolation,
    /// A directory that should be validated does not exist
    MissingTargetDir,

    // === References ===
    /// Two records of one entity type share a name
    DuplicateName,
    /// `extends` names a record that does not exist
    DanglingExtends,
    /// `extends` edges form a cycle
    InheritanceCycle,
    /// Record has no name and was skipped
    MissingName,
    /// Record must declare `extends` but does not
    MissingExtends,
    /// Record could not be merged because an ancestor failed
    UnresolvedAncestor,

    // === Dictionary ===
    /// Attribute used in a file but absent from the dictionary
    UndocumentedAttribute,
    /// Dictionary entry never used by any file
    UnusedDictionaryEntry,

    // === Categories ===
    /// `category` is not a string
    NonStringCategory,
    /// `category` is not in the allowed vocabulary
    UnknownCategory,

    // === Cross-representation ===
    /// Message name differs from the entity caption in Title Case
    MessageNameMismatch,
    /// Entity attribute has no matching message field
    MissingMessageField,
    /// Message field has no matching entity attribute
    ExtraMessageField,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SchemaViolation => "E001",
            Self::DuplicateName => "E002",
            Self::DanglingExtends => "E003",
            Self::InheritanceCycle => "E004",
            Self::MissingExtends => "E005",
            Self::UnresolvedAncestor => "E006",
            Self::UndocumentedAttribute => "E007",
            Self::NonStringCategory => "E008",
            Self::UnknownCategory => "E009",
            Self::MessageNameMismatch => "E010",
            Self::MissingMessageField => "E011",
            Self::MissingTargetDir => "W001",
            Self::MissingName => "W002",
            Self::UnusedDictionaryEntry => "W003",
            Self::ExtraMessageField => "W004",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::SchemaViolation
            | Self::DuplicateName
            | Self::DanglingExtends
            | Self::InheritanceCycle
            | Self::MissingExtends
            | Self::UnresolvedAncestor
            | Self::UndocumentedAttribute
            | Self::NonStringCategory
            | Self::UnknownCategory
            | Self::MessageNameMismatch
            | Self::MissingMessageField => Severity::Error,

            Self::MissingTargetDir
            | Self::MissingName
            | Self::UnusedDictionaryEntry
            | Self::ExtraMessageField => Severity::Warning,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Severity
// =============================================================================

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

// =============================================================================
// Diagnostic Item
// =============================================================================

/// A single diagnostic item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticItem {
    /// File or entity the diagnostic is about
    pub subject: String,
    pub code: DiagnosticCode,
    /// Human-readable message
    pub message: String,
    /// Additional context (related files, suggestions)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,
}

impl DiagnosticItem {
    pub fn new(subject: impl Into<String>, code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            code,
            message: message.into(),
            context: Vec::new(),
        }
    }

    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// One-line rendering used in the `{errors, warnings}` summary
    pub fn summary_line(&self) -> String {
        if self.context.is_empty() {
            self.message.clone()
        } else {
            format!("{} ({})", self.message, self.context.join("; "))
        }
    }
}

impl fmt::Display for DiagnosticItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {} ({})",
            self.code,
            self.code.severity(),
            self.message,
            self.subject
        )?;

        for ctx in &self.context {
            write!(f, "\n  - {}", ctx)?;
        }

        Ok(())
    }
}

// =============================================================================
// Diagnostics Collection
// =============================================================================

/// Collection of diagnostics from one check
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    items: Vec<DiagnosticItem>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: DiagnosticItem) {
        self.items.push(item);
    }

    /// Add an item built from its parts
    pub fn report(&mut self, subject: impl Into<String>, code: DiagnosticCode, message: impl Into<String>) {
        self.push(DiagnosticItem::new(subject, code, message));
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|i| i.severity() == Severity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter().filter(|i| i.severity() == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter().filter(|i| i.severity() == Severity::Warning)
    }

    pub fn all(&self) -> &[DiagnosticItem] {
        &self.items
    }

    /// Items carrying a specific code
    pub fn with_code(&self, code: DiagnosticCode) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter().filter(move |i| i.code == code)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    /// Merge another Diagnostics into this one
    pub fn merge(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    /// `{errors: [...], warnings: [...]}` view
    pub fn summary(&self) -> CheckSummary {
        CheckSummary {
            errors: self.errors().map(DiagnosticItem::summary_line).collect(),
            warnings: self.warnings().map(DiagnosticItem::summary_line).collect(),
        }
    }

    pub fn format_all(&self) -> String {
        let mut output = String::new();

        for item in &self.items {
            output.push_str(&format!("{}\n", item));
        }

        if self.has_errors() {
            output.push_str(&format!(
                "\n{} error(s), {} warning(s)\n",
                self.error_count(),
                self.warning_count()
            ));
        } else if !self.is_empty() {
            output.push_str(&format!("\n{} warning(s)\n", self.warning_count()));
        }

        output
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_all())
    }
}

impl IntoIterator for Diagnostics {
    type Item = DiagnosticItem;
    type IntoIter = std::vec::IntoIter<DiagnosticItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a DiagnosticItem;
    type IntoIter = std::slice::Iter<'a, DiagnosticItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

// =============================================================================
// Run Report
// =============================================================================

/// Check categories, in the order they run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckKind {
    Metaschema,
    References,
    Dictionary,
    Categories,
    Protocol,
}

impl CheckKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckKind::Metaschema => "metaschema",
            CheckKind::References => "references",
            CheckKind::Dictionary => "dictionary",
            CheckKind::Categories => "categories",
            CheckKind::Protocol => "protocol",
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serialized view of one check
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckSummary {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Outcome of a complete run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    /// SHA-256 over every loaded file, in path order
    pub corpus_hash: String,
    pub files: usize,
    pub checks: IndexMap<CheckKind, Diagnostics>,
}

impl RunReport {
    pub fn new(corpus_hash: impl Into<String>, files: usize) -> Self {
        Self {
            generated_at: Utc::now(),
            corpus_hash: corpus_hash.into(),
            files,
            checks: IndexMap::new(),
        }
    }

    /// Record a check's diagnostics, merging if the check already ran
    pub fn record(&mut self, kind: CheckKind, diagnostics: Diagnostics) {
        self.checks.entry(kind).or_default().merge(diagnostics);
    }

    pub fn check(&self, kind: CheckKind) -> Option<&Diagnostics> {
        self.checks.get(&kind)
    }

    /// True iff no check produced an error
    pub fn passed(&self) -> bool {
        !self.checks.values().any(Diagnostics::has_errors)
    }

    pub fn error_count(&self) -> usize {
        self.checks.values().map(Diagnostics::error_count).sum()
    }

    pub fn warning_count(&self) -> usize {
        self.checks.values().map(Diagnostics::warning_count).sum()
    }

    /// `{check: {errors, warnings}}` document
    pub fn summary(&self) -> serde_json::Value {
        let checks: serde_json::Map<String, serde_json::Value> = self
            .checks
            .iter()
            .map(|(kind, diags)| {
                let summary = diags.summary();
                (
                    kind.as_str().to_string(),
                    serde_json::json!({
                        "errors": summary.errors,
                        "warnings": summary.warnings,
                    }),
                )
            })
            .collect();

        serde_json::json!({
            "generated_at": self.generated_at.to_rfc3339(),
            "corpus_hash": self.corpus_hash,
            "files": self.files,
            "passed": self.passed(),
            "checks": checks,
        })
    }
}
