//! EBML primitives: element IDs, variable-length integers and a reader.

pub mod ids;
pub mod reader;
pub mod vint;

pub use reader::{inspect, EbmlReader, ElementHeader, ElementNode, ElementValue, SimpleBlockView};
