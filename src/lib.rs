//! OASF Schema Consistency Engine
//!
//! Loads the OASF class-based schema corpus, resolves `extends` inheritance
//! into fully merged entity definitions, and cross-checks the result.
//!
//! ## Checks
//!
//! - **Meta-schema**: every document against its class JSON Schema
//! - **References**: duplicate names, dangling `extends`, inheritance cycles
//! - **Dictionary**: attribute keys against the shared attribute dictionary
//! - **Categories**: `category` values against per-type vocabularies
//! - **Protocol**: resolved entities against `.proto` messages
//!
//! ## Corpus Layout
//!
//! ```text
//! schema/
//! ├── dictionary.json
//! ├── skill_categories.json
//! ├── domain_categories.json
//! ├── module_categories.json
//! ├── metaschema/
//! │   ├── class.schema.json
//! │   ├── object.schema.json
//! │   └── dictionary.schema.json
//! ├── objects/
//! ├── skills/
//! ├── domains/
//! ├── modules/
//! ├── profiles/
//! └── extensions/
//! ```

pub mod category;
pub mod checker;
pub mod compare;
pub mod config;
pub mod corpus;
pub mod dictionary;
pub mod entity;
pub mod error;
pub mod metaschema;
pub mod proto;
pub mod report;
pub mod resolve;
pub mod suggest;

pub use checker::SchemaChecker;
pub use config::CheckConfig;
pub use corpus::Corpus;
pub use entity::{AttributeMap, AttributeSpec, EntityRecord, EntityType};
pub use error::{CheckError, Result};
pub use report::{CheckKind, DiagnosticCode, DiagnosticItem, Diagnostics, RunReport, Severity};
pub use resolve::{ResolvedEntity, ResolvedSet, Resolver};
