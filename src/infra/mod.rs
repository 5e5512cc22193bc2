//! Infrastructure adapters: the graph store boundary and composite field codecs.

pub mod codec;
pub mod store;

pub use codec::{FieldCodec, JsonListCodec};
pub use store::{Edge, GraphStore, InMemoryGraphStore, Node};
