//! Scene description for the Strata translator.
//!
//! This crate provides:
//! - A USDA text parser producing per-layer prim specs
//! - Layer stack and reference composition into a [`Stage`]
//! - Instancing through shared prototype roots
//! - Pre/post-order traversal with pruning
//! - Time-sampled attributes, transforms, primvar inheritance and
//!   material binding queries
//! - A process-wide [`StageCache`]

mod compose;
pub mod cache;
pub mod layer;
pub mod prim;
pub mod primvar;
pub mod shade;
pub mod stage;
pub mod traversal;
pub mod usda;
pub mod value;
pub mod xform;

pub use cache::StageCache;
pub use layer::Layer;
pub use prim::Prim;
pub use primvar::Primvar;
pub use shade::{split_property_path, ConnectedInput, ShaderSource};
pub use stage::{PrimId, Stage, StageError, StageResult};
pub use traversal::{descendants, PrimRange, Visit};
pub use usda::{ParseError, ParseResult};
pub use value::{Attribute, Value};
pub use xform::{
    local_transformation, transform_might_be_time_varying, transform_time_samples_in_interval, XformCache, XformOp,
};
