pub mod check;
pub mod normalize;

pub use check::{check, CheckArgs};
pub use normalize::{normalize, NormalizeArgs};

use anyhow::Result;
use folio_document::raw::{self, DeserializeOptions};
use folio_document::Tree;
use std::fs;
use std::path::Path;

/// Read a raw state JSON file into a tree
pub(crate) fn read_tree(path: &Path, preserve_keys: bool) -> Result<Tree> {
    let source = fs::read_to_string(path)?;
    let tree = raw::from_json(&source, &DeserializeOptions { preserve_keys })?;
    Ok(tree)
}
