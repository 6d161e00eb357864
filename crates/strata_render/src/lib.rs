//! Renderer node graph for the Strata translator.
//!
//! Nodes live in a [`Universe`] and are referred to by [`NodeHandle`].
//! Each node has a type ([`NodeEntry`]), typed parameters, links from
//! other nodes' outputs and an optional parent node scoping its name.

pub mod node;
pub mod snapshot;
pub mod universe;
pub mod value;

pub use node::{NodeCategory, NodeEntry, NodeHandle, NodeMask, NodeParam};
pub use snapshot::{NodeSnapshot, UniverseSnapshot};
pub use universe::{Link, RenderError, RenderResult, Universe};
pub use value::AttrValue;

/// Ray visibility bits.
pub mod ray {
    pub const NONE: u8 = 0x00;
    pub const CAMERA: u8 = 0x01;
    pub const SHADOW: u8 = 0x02;
    pub const DIFFUSE_TRANSMIT: u8 = 0x04;
    pub const SPECULAR_TRANSMIT: u8 = 0x08;
    pub const VOLUME: u8 = 0x10;
    pub const DIFFUSE_REFLECT: u8 = 0x20;
    pub const SPECULAR_REFLECT: u8 = 0x40;
    pub const SUBSURFACE: u8 = 0x80;
    pub const ALL: u8 = 0xFF;
}
