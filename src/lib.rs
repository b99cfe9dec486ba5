//! Bento MDF
//!
//! Reads graph data models described in Model Description Format (MDF) YAML,
//! writes them back out, and compares two models.
//!
//! ## Features
//!
//! - **Multi-file Models**: MDF split over several files is deep-merged into one document
//! - **Schema Validation**: MDF is checked against the bundled MDF JSON schema
//! - **Diagnostics**: Problems that leave a usable model are collected, not fatal
//! - **Controlled Vocabulary**: Terms, value sets and enum references are interned once per model
//! - **Model Diff**: Set-based comparison with a plain-language summary
//!
//! ## Pipeline
//!
//! ```text
//! *.yml ──► MdfLoader ──► MdfValidator ──► MdfReader ──► Model
//!   (merge, dedupe)     (JSON schema)     (5 passes)      │
//!                                                         ├──► MdfWriter ──► MDF YAML
//!                                    Model + Model ──► diff_models ──► ModelDiff (+ summary)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use bento_mdf::{MdfReader, MdfSource, ReaderOptions};
//!
//! let reader = MdfReader::from_sources(
//!     &[MdfSource::from("model.yml"), MdfSource::from("model-props.yml")],
//!     ReaderOptions::default(),
//! )?;
//! let model = reader.model()?;
//! println!("{} nodes", model.nodes().len());
//! # Ok::<(), bento_mdf::MdfError>(())
//! ```

pub mod checksum;
pub mod config;
pub mod diagnostics;
pub mod diff;
pub mod error;
pub mod loader;
pub mod mdf;
pub mod model;
pub mod validator;

pub use checksum::{Checksum, SourceDigest};
pub use config::MdfConfig;
pub use diagnostics::{DiagnosticCode, DiagnosticItem, Diagnostics, Severity};
pub use diff::{diff_models, DiffOptions, ModelDiff};
pub use error::{MdfError, Result};
pub use loader::{LoaderConfig, MdfLoader, MdfSource};
pub use mdf::{MdfReader, MdfWriter, ReaderOptions, WriterConfig};
pub use model::Model;
pub use validator::MdfValidator;
