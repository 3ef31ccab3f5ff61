//! # Folio Editor
//!
//! Transactional editing and schema normalization for Folio documents.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ state: committed {tree, selection}          │
//! └─────────────────────────────────────────────┘
//!                     ↓ change()
//! ┌─────────────────────────────────────────────┐
//! │ change: open transaction                    │
//! │  - By-key and selection-level edits         │
//! │  - Every edit recorded as an Operation      │
//! │  - Touched keys collected as dirty          │
//! └─────────────────────────────────────────────┘
//!                     ↓ commit()
//! ┌─────────────────────────────────────────────┐
//! │ schema: rules repaired to a fixed point     │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Committed states are valid**: every commit ends with a normalization pass
//! 2. **Operations are the only mutation**: repairs are operations too
//! 3. **Failures poison the transaction**: the base state is never touched
//!
//! ## Usage
//!
//! ```rust
//! use folio_document::{Node, Selection};
//! use folio_editor::{EditorError, State};
//!
//! let state = State::from_document(Node::document(vec![
//!     Node::block("paragraph", vec![Node::text("Hello").with_key("t")]),
//! ]))?;
//!
//! let mut change = state.change();
//! change.select(Selection::collapsed("t", 5))?.insert_text(", world")?;
//! let committed = change.commit()?;
//!
//! assert_eq!(committed.state.document().text_content(), "Hello, world");
//! # Ok::<(), EditorError>(())
//! ```

mod change;
mod errors;
pub mod operations;
pub mod schema;
mod state;

pub use change::{ApplyOptions, Change, Committed};
pub use errors::{EditorError, EditorResult};
pub use operations::{invert_operations, NodeProperties, Operation};
pub use schema::{FnRule, Schema, SchemaOptions, SchemaRule, Violation};
pub use state::State;
