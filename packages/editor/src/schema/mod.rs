//! # Schema
//!
//! Structural rules a document must satisfy and the engine that repairs
//! documents which do not.
//!
//! A rule is three capabilities: `matches` picks the nodes it cares about,
//! `validate` reports what is wrong with one of them, and `normalize`
//! repairs it by issuing operations through the open [`Change`]. Rules run
//! in declared order: the nine core rules first, then caller rules.

pub mod normalizer;
pub mod rules;
mod violation;

pub use violation::Violation;

use crate::change::Change;
use crate::errors::EditorResult;
use folio_document::{Node, Tree};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::marker::PhantomData;

/// A structural rule
pub trait SchemaRule: Send + Sync {
    /// What `validate` reports and `normalize` consumes
    type Invalid: 'static;

    /// Unique identifier for this rule
    fn name(&self) -> &'static str;

    /// Human-readable description
    fn description(&self) -> &'static str {
        ""
    }

    fn matches(&self, node: &Node) -> bool;

    fn validate(&self, node: &Node) -> Option<Self::Invalid>;

    fn normalize(&self, change: &mut Change, node: &Node, invalid: Self::Invalid) -> EditorResult<()>;

    /// Message for a violation report
    fn describe(&self, _invalid: &Self::Invalid) -> String {
        self.description().to_string()
    }
}

/// A violation waiting to be repaired
pub(crate) struct Pending<'a> {
    pub message: String,
    pub repair: Box<dyn FnOnce(&mut Change, &Node) -> EditorResult<()> + 'a>,
}

/// Object-safe view of a [`SchemaRule`]
pub(crate) trait DynRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn matches(&self, node: &Node) -> bool;
    fn check<'a>(&'a self, node: &Node) -> Option<Pending<'a>>;
}

impl<R: SchemaRule> DynRule for R {
    fn name(&self) -> &'static str {
        SchemaRule::name(self)
    }

    fn matches(&self, node: &Node) -> bool {
        SchemaRule::matches(self, node)
    }

    fn check<'a>(&'a self, node: &Node) -> Option<Pending<'a>> {
        let invalid = self.validate(node)?;
        Some(Pending {
            message: self.describe(&invalid),
            repair: Box::new(move |change: &mut Change, node: &Node| self.normalize(change, node, invalid)),
        })
    }
}

/// A rule built from three closures
///
/// ```rust
/// use folio_editor::{ApplyOptions, FnRule, Schema};
///
/// let no_headings = FnRule::new(
///     "no-headings",
///     |node| node.node_type() == Some("heading"),
///     |node| Some(node.key().clone()),
///     |change, _node, key| {
///         change.remove_node_by_key_with(&key, ApplyOptions::SILENT)?;
///         Ok(())
///     },
/// );
/// let schema = Schema::core().with_rule(no_headings);
/// assert_eq!(schema.len(), 10);
/// ```
pub struct FnRule<M, V, N, I> {
    name: &'static str,
    matches: M,
    validate: V,
    normalize: N,
    _invalid: PhantomData<fn() -> I>,
}

impl<M, V, N, I> FnRule<M, V, N, I>
where
    M: Fn(&Node) -> bool + Send + Sync,
    V: Fn(&Node) -> Option<I> + Send + Sync,
    N: Fn(&mut Change, &Node, I) -> EditorResult<()> + Send + Sync,
    I: Debug + 'static,
{
    pub fn new(name: &'static str, matches: M, validate: V, normalize: N) -> Self {
        Self {
            name,
            matches,
            validate,
            normalize,
            _invalid: PhantomData,
        }
    }
}

impl<M, V, N, I> SchemaRule for FnRule<M, V, N, I>
where
    M: Fn(&Node) -> bool + Send + Sync,
    V: Fn(&Node) -> Option<I> + Send + Sync,
    N: Fn(&mut Change, &Node, I) -> EditorResult<()> + Send + Sync,
    I: Debug + 'static,
{
    type Invalid = I;

    fn name(&self) -> &'static str {
        self.name
    }

    fn matches(&self, node: &Node) -> bool {
        (self.matches)(node)
    }

    fn validate(&self, node: &Node) -> Option<I> {
        (self.validate)(node)
    }

    fn normalize(&self, change: &mut Change, node: &Node, invalid: I) -> EditorResult<()> {
        (self.normalize)(change, node, invalid)
    }

    fn describe(&self, invalid: &I) -> String {
        format!("{}: {:?}", self.name, invalid)
    }
}

/// Normalization settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaOptions {
    /// Repair budget for one pass; derived from the dirty set when unset
    #[serde(default)]
    pub max_iterations: Option<usize>,
}

/// Ordered rule set
pub struct Schema {
    rules: Vec<Box<dyn DynRule>>,
}

impl Schema {
    /// The nine core rules
    pub fn core() -> Self {
        Self {
            rules: vec![
                Box::new(rules::DocumentChildrenRule),
                Box::new(rules::BlockChildrenRule),
                Box::new(rules::InlineChildrenRule),
                Box::new(rules::ContainerNotEmptyRule),
                Box::new(rules::VoidContentRule),
                Box::new(rules::EmptyInlinesRule),
                Box::new(rules::InlineBoundariesRule),
                Box::new(rules::AdjacentTextsRule),
                Box::new(rules::EmptyTextsRule),
            ],
        }
    }

    /// A schema without any rules, not even the core ones
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn with_rule<R: SchemaRule + 'static>(mut self, rule: R) -> Self {
        self.add_rule(rule);
        self
    }

    pub fn add_rule<R: SchemaRule + 'static>(&mut self, rule: R) {
        self.rules.push(Box::new(rule));
    }

    /// Append another schema's rules after these
    pub fn extend(mut self, other: Schema) -> Self {
        self.rules.extend(other.rules);
        self
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|rule| rule.name()).collect()
    }

    pub(crate) fn rules(&self) -> &[Box<dyn DynRule>] {
        &self.rules
    }

    /// Report every violation in `tree` without repairing anything
    pub fn check(&self, tree: &Tree) -> Vec<Violation> {
        let document = tree.document();
        std::iter::once(document.as_ref())
            .chain(document.descendants())
            .flat_map(|node| {
                self.rules
                    .iter()
                    .filter(move |rule| rule.matches(node))
                    .filter_map(move |rule| {
                        rule.check(node)
                            .map(|pending| Violation::new(rule.name(), node.key().clone(), pending.message))
                    })
            })
            .collect()
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::core()
    }
}

impl std::fmt::Debug for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schema")
            .field("rules", &format!("{} rules", self.rules.len()))
            .finish()
    }
}
