//! Reading and writing MDF
//!
//! - `convert`: one MDF object to one model entity
//! - `domain`: `Type`/`Enum` descriptors to value domains
//! - `props`: which properties are shared between owners
//! - `enum_ref`: enumerations defined in other documents
//! - `reader`: the multi-pass model build
//! - `writer`: a model back to MDF

pub mod convert;
pub mod domain;
pub mod enum_ref;
pub mod props;
pub mod reader;
pub mod writer;

pub use domain::{DomainDescriptor, ValueSetSource};
pub use props::{PropertyTable, Sharing};
pub use reader::{BuildStage, MdfReader, ReaderOptions};
pub use writer::{MdfWriter, WriterConfig};
