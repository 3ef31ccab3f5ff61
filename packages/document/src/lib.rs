//! # Folio Document
//!
//! The immutable document model: typed nodes, tree snapshots with a key
//! index, selections and the raw JSON boundary.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ raw: JSON ⇄ Tree                            │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ tree: snapshot + key → path index           │
//! │  - Lookups by key (parent, ancestors, ...)  │
//! │  - Path-copying edit primitives             │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ node: document → block/inline → text        │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Nothing here mutates a published snapshot. Editing happens in
//! `folio-editor`, which builds new trees from the primitives exposed here.
//!
//! ## Usage
//!
//! ```rust
//! use folio_document::{raw, Node, Tree};
//!
//! let tree = Tree::from_nodes(vec![Node::block("paragraph", vec![Node::text("one")])])?;
//! let json = raw::to_json(&tree, &raw::SerializeOptions::default())?;
//! let reloaded = raw::from_json(&json, &raw::DeserializeOptions::default())?;
//! assert!(reloaded.content_eq(&tree));
//! # Ok::<(), folio_document::DocumentError>(())
//! ```

pub mod error;
pub mod key;
pub mod node;
pub mod raw;
pub mod selection;
pub mod tree;

pub use error::{DocumentError, DocumentResult};
pub use key::Key;
pub use node::{Data, Descendants, Document, Element, Kind, Leaf, Mark, Marks, Node, Text, Texts};
pub use selection::{Point, Selection, SelectionPatch};
pub use tree::{Path, Tree};
