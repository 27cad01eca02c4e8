//! Sparkmap — static column lineage for PySpark DataFrame pipelines.
//!
//! Parses a pipeline script and reconstructs, for every target column, the
//! source tables and columns feeding it, the transformation expression, the
//! join topology between the tables and any declared data-quality rule.
//!
//! - [`ast`]: owned program model lowered from tree-sitter, canonical text
//! - [`extract`]: binding tracker, resolver, recognizers, comprehension
//!   expansion, DQ parsing
//! - [`report`]: Markdown / JSON renderings
//! - [`config`]: layered configuration

pub mod ast;
pub mod config;
pub mod error;
pub mod extract;
pub mod report;

// Re-exports for convenience
pub use config::{ExtractorConfig, ReportConfig, ReportFormat, SparkmapConfig, load_config};
pub use error::{AstError, ConfigError, ExtractError};
pub use extract::{
    ArrayField, ColumnMapping, Diagnostic, DqRuleIndex, Extraction, Extractor, JoinRecord,
    SkipReason, extract_file,
};
pub use report::{output_file_name, render, render_json, render_markdown};
