//! Fixed-point repair loop
//!
//! Each sweep walks the rules in declared order and, for each rule, the
//! dirty nodes deepest first. The first violation found is repaired, the
//! nodes around it are marked dirty again and the sweep restarts from the
//! first rule. A sweep without violations ends the pass.

use crate::change::Change;
use crate::errors::{EditorError, EditorResult};
use folio_document::{Key, Path};
use std::cmp::Reverse;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Lower bound of the repair budget
pub const MIN_ITERATIONS: usize = 100;

/// Repairs allowed per initially dirty node
pub const ITERATIONS_PER_NODE: usize = 50;

/// Repair until no rule reports a violation; returns the repair count
#[instrument(skip_all, fields(dirty = change.dirty().len()))]
pub fn normalize(change: &mut Change) -> EditorResult<usize> {
    let schema = Arc::clone(change.schema());
    let budget = change
        .options()
        .max_iterations
        .unwrap_or_else(|| MIN_ITERATIONS.max(change.dirty().len() * ITERATIONS_PER_NODE));
    let mut iterations = 0;

    'sweep: loop {
        let dirty = dirty_in_order(change);
        if dirty.is_empty() {
            break;
        }

        for rule in schema.rules() {
            for key in &dirty {
                let Ok(node) = change.tree().get_node(key).map(Arc::clone) else {
                    continue;
                };
                if !rule.matches(&node) {
                    continue;
                }
                let Some(pending) = rule.check(&node) else {
                    continue;
                };

                if iterations >= budget {
                    warn!(rule = rule.name(), key = %key, iterations, "normalization diverged");
                    return Err(EditorError::NormalizationDivergence {
                        rule: rule.name().to_string(),
                        key: key.clone(),
                        iterations,
                    });
                }
                iterations += 1;

                debug!(rule = rule.name(), key = %key, message = %pending.message, "repairing");
                (pending.repair)(change, &node)?;
                change.mark_repaired(key);
                continue 'sweep;
            }
        }

        break;
    }

    change.clear_dirty();
    debug!(iterations, "normalization reached a fixed point");
    Ok(iterations)
}

/// Dirty keys still in the tree, deepest first, then in document order
fn dirty_in_order(change: &Change) -> Vec<Key> {
    let tree = change.tree();
    let mut keys: Vec<(&Path, &Key)> = change
        .dirty()
        .iter()
        .filter_map(|key| tree.get_path(key).ok().map(|path| (path, key)))
        .collect();
    keys.sort_by_key(|(path, _)| (Reverse(path.depth()), *path));
    keys.into_iter().map(|(_, key)| key.clone()).collect()
}
