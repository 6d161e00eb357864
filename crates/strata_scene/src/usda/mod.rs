//! USDA text format support.
//!
//! The parser produces per-layer [`PrimSpec`] trees; composition into a
//! stage happens in [`crate::stage`].

mod literal;
pub mod parser;
pub mod types;

pub use parser::{parse_usda, ParseError, ParseResult, ParsedLayer, UsdaParser};
pub use types::{LayerMetadata, PrimSpec, Reference, Relationship, Specifier};
