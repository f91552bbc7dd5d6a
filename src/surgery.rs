//! Tree surgery operations
//!
//! Operations rewrite a tree at nodes located through a [`Match`] produced by
//! an external pattern matcher. Each operation is a node in a small command
//! tree: `adjoin` takes one child operation (normally a [`FetchNode`]) that
//! yields the target node.
//!
//! Adjunction works as in Tree-Adjoining Grammar. A copy of the auxiliary
//! tree replaces the target, and the target's children move under the copy's
//! foot node:
//!
//! ```text
//! target:     (VP (VBD saw) (NP Mary))
//! auxiliary:  (VP (ADVP (RB really)) VP@)
//! result:     (VP (ADVP (RB really)) (VP (VBD saw) (NP Mary)))
//! ```
//!
//! The auxiliary tree is grafted into the target's arena as fresh nodes on
//! every application, so two adjunctions never share structure.

use pest::Parser;
use pest_derive::Parser;
use rustc_hash::FxHashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

use crate::reader::{ReadError, read_tree};
use crate::tree::{Label, NodeId, Tree, TreeError};

#[derive(Parser)]
#[grammar = "surgery.pest"]
struct SurgeryParser;

/// Suffix marking the foot of an auxiliary tree
pub const FOOT_MARKER: char = '@';

/// Label suffix replaced by a fresh coindex each time an auxiliary tree is copied
pub const COINDEX_PLACEHOLDER: &str = "-$";

/// Error type for tree surgery failures
#[derive(Debug, Error)]
pub enum SurgeryError {
    #[error("Surgery error: {0}")]
    Argument(String),

    #[error("Surgery error: auxiliary tree must have exactly one foot, found {0}")]
    Foot(usize),

    #[error("Surgery error: {0}")]
    Syntax(#[from] Box<pest::error::Error<Rule>>),

    #[error("Surgery error: {0}")]
    Read(#[from] ReadError),

    #[error("Surgery error: {0}")]
    Tree(#[from] TreeError),

    #[error("Surgery error: coindexes exhausted after {0}")]
    Exhausted(u32),
}

impl From<pest::error::Error<Rule>> for SurgeryError {
    fn from(err: pest::error::Error<Rule>) -> Self {
        SurgeryError::Syntax(Box::new(err))
    }
}

/// Named node bindings from a pattern match
#[derive(Debug, Clone, Default)]
pub struct Match {
    bindings: FxHashMap<String, NodeId>,
}

impl Match {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, node: NodeId) -> Self {
        self.bind(name, node);
        self
    }

    pub fn bind(&mut self, name: &str, node: NodeId) {
        self.bindings.insert(name.to_string(), node);
    }

    /// Get the node bound to a name
    pub fn get(&self, name: &str) -> Option<NodeId> {
        self.bindings.get(name).copied()
    }

    /// Iterate over (name, node) bindings in no particular order
    pub fn iter_named(&self) -> impl Iterator<Item = (&str, NodeId)> + '_ {
        self.bindings.iter().map(|(name, &id)| (name.as_str(), id))
    }
}

/// Source of fresh coindexation numbers
#[derive(Debug, Clone, Default)]
pub struct CoindexationGenerator {
    last_index: u32,
}

impl CoindexationGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue numbering after the highest index already used in `tree`
    pub fn set_last_index(&mut self, tree: &Tree) {
        let Some(root) = tree.root() else {
            return;
        };
        for id in tree.preorder(root) {
            if let Some(index) = tree.value(id).and_then(coindex_of) {
                self.last_index = self.last_index.max(index);
            }
        }
    }

    pub fn generate_index(&mut self) -> Result<u32, SurgeryError> {
        self.last_index = self
            .last_index
            .checked_add(1)
            .ok_or(SurgeryError::Exhausted(self.last_index))?;
        Ok(self.last_index)
    }

    pub fn last_index(&self) -> u32 {
        self.last_index
    }
}

/// Trailing `-<digits>` index of a label like `NP-SBJ-2` or `*T*-1`
fn coindex_of(label: &str) -> Option<u32> {
    let (base, digits) = label.rsplit_once('-')?;
    if base.is_empty() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// `NP=subj` names the node `subj`; `NP=2` is a gap index, not a name
fn split_name(label: &str) -> Option<(&str, &str)> {
    let (base, name) = label.rsplit_once('=')?;
    let starts_alpha = name.chars().next().is_some_and(char::is_alphabetic);
    (!base.is_empty() && starts_alpha).then_some((base, name))
}

fn is_coindexed(label: &str) -> bool {
    let base = split_name(label).map_or(label, |(base, _)| base);
    base.ends_with(COINDEX_PLACEHOLDER)
}

/// State shared by the operations applied to one tree
///
/// Node ids are only meaningful in the tree they came from, so a context
/// must not be carried over to another tree. [`apply_all`] forgets the
/// names registered for one match before it moves on to the next.
#[derive(Debug, Default)]
pub struct SurgeryContext {
    pub coindexer: CoindexationGenerator,
    /// Nodes named in auxiliary trees, by name, as created in the last copy
    pub new_node_names: FxHashMap<String, NodeId>,
}

impl SurgeryContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context whose coindexes continue after those already in `tree`
    pub fn for_tree(tree: &Tree) -> Self {
        let mut ctx = Self::new();
        ctx.coindexer.set_last_index(tree);
        ctx
    }
}

/// A node of a tree surgery command
pub trait SurgeryOp: fmt::Display + fmt::Debug + Send + Sync {
    /// Apply the operation to `tree`
    ///
    /// Returns the node the operation produced or located, or `Ok(None)` if
    /// it did not fire. `tree.root()` is the overall result afterwards.
    fn evaluate(
        &self,
        tree: &mut Tree,
        matched: &Match,
        ctx: &mut SurgeryContext,
    ) -> Result<Option<NodeId>, SurgeryError>;
}

/// Locates the node bound to a name
#[derive(Debug, Clone)]
pub struct FetchNode {
    name: String,
}

impl FetchNode {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

impl SurgeryOp for FetchNode {
    fn evaluate(
        &self,
        _tree: &mut Tree,
        matched: &Match,
        ctx: &mut SurgeryContext,
    ) -> Result<Option<NodeId>, SurgeryError> {
        Ok(matched
            .get(&self.name)
            .or_else(|| ctx.new_node_names.get(&self.name).copied()))
    }
}

impl fmt::Display for FetchNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A tree fragment with one foot node, the insertion point for adjunction
#[derive(Debug, Clone)]
pub struct AuxiliaryTree {
    tree: Tree,
    foot: NodeId,
    coindexed: bool,
    rendered: String,
}

impl AuxiliaryTree {
    /// Locate the foot (the one leaf labeled `X@`) and strip its marker
    pub fn new(mut tree: Tree) -> Result<Self, SurgeryError> {
        let root = tree.root().ok_or(TreeError::NoRoot)?;
        let rendered = tree.render(root);

        let feet: Vec<NodeId> = tree
            .leaves(root)
            .into_iter()
            .filter(|&leaf| tree.value(leaf).is_some_and(is_foot_label))
            .collect();
        let [foot] = feet.as_slice() else {
            return Err(SurgeryError::Foot(feet.len()));
        };
        let foot = *foot;

        let label = tree.label_mut(foot)?;
        let value = label.value.as_deref().unwrap_or_default();
        let category = value.strip_suffix(FOOT_MARKER).unwrap_or(value).to_string();
        *label = Label::new(&category);

        let coindexed = tree
            .preorder(root)
            .into_iter()
            .any(|id| tree.value(id).is_some_and(is_coindexed));
        Ok(Self {
            tree,
            foot,
            coindexed,
            rendered,
        })
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn foot(&self) -> NodeId {
        self.foot
    }

    /// Graft a fresh copy into `target`, returning the copy's `(root, foot)`
    ///
    /// Coindex placeholders get one new index per copy and named nodes are
    /// registered in the context under their names.
    pub fn copy_into(
        &self,
        target: &mut Tree,
        ctx: &mut SurgeryContext,
    ) -> Result<(NodeId, NodeId), SurgeryError> {
        let root = self.tree.root().ok_or(TreeError::NoRoot)?;
        let index = if self.coindexed {
            Some(ctx.coindexer.generate_index()?)
        } else {
            None
        };
        let mut foot = None;

        let copy = target.graft_with(&self.tree, root, |src, dst, label| {
            if src == self.foot {
                foot = Some(dst);
            }
            let Some(original) = label.value.clone() else {
                return;
            };

            let mut text = original.clone();
            if let Some((base, name)) = split_name(&text) {
                ctx.new_node_names.insert(name.to_string(), dst);
                text = base.to_string();
            }
            if let (Some(i), Some(base)) = (index, text.strip_suffix(COINDEX_PLACEHOLDER)) {
                text = format!("{base}-{i}");
            }

            if text != original {
                if label.word.as_deref() == Some(original.as_str()) {
                    label.word = Some(text.clone());
                }
                label.value = Some(text);
            }
        })?;

        let foot = foot.ok_or(SurgeryError::Foot(0))?;
        Ok((copy, foot))
    }
}

fn is_foot_label(value: &str) -> bool {
    value.len() > 1 && value.ends_with(FOOT_MARKER) && !value.ends_with("\\@")
}

impl FromStr for AuxiliaryTree {
    type Err = SurgeryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuxiliaryTree::new(read_tree(s)?)
    }
}

impl fmt::Display for AuxiliaryTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}

/// Adjoin an auxiliary tree at the node located by the child operation
#[derive(Debug)]
pub struct AdjoinNode {
    aux: AuxiliaryTree,
    child: Box<dyn SurgeryOp>,
}

impl AdjoinNode {
    pub fn new(aux: AuxiliaryTree, child: Box<dyn SurgeryOp>) -> Self {
        Self { aux, child }
    }

    /// Build from a list of child operations, which must hold exactly one
    pub fn with_children(
        aux: AuxiliaryTree,
        mut children: Vec<Box<dyn SurgeryOp>>,
    ) -> Result<Self, SurgeryError> {
        if children.len() != 1 {
            return Err(SurgeryError::Argument(format!(
                "adjoin takes exactly one child operation, got {}",
                children.len()
            )));
        }
        let child = children.remove(0);
        Ok(Self::new(aux, child))
    }

    pub fn auxiliary_tree(&self) -> &AuxiliaryTree {
        &self.aux
    }
}

impl SurgeryOp for AdjoinNode {
    fn evaluate(
        &self,
        tree: &mut Tree,
        matched: &Match,
        ctx: &mut SurgeryContext,
    ) -> Result<Option<NodeId>, SurgeryError> {
        let Some(target) = self.child.evaluate(tree, matched, ctx)? else {
            debug!(op = %self, "no target, adjunction did not fire");
            return Ok(None);
        };
        if !tree.is_attached(target) {
            debug!(node = target, "target is not in the tree, adjunction did not fire");
            return Ok(None);
        }

        let parent = tree.parent(target);
        let (aux_root, foot) = self.aux.copy_into(tree, ctx)?;

        // the target's children move under the foot; the target is dropped
        let children = tree.children(target).to_vec();
        tree.set_children(foot, children)?;

        match parent {
            None => tree.set_root(aux_root)?,
            Some(parent) => {
                tree.replace_child(parent, target, aux_root)?;
            }
        }
        debug!(node = target, root = aux_root, "adjoined");
        Ok(Some(aux_root))
    }
}

impl fmt::Display for AdjoinNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "adjoin({})<-{}", self.child, self.aux)
    }
}

/// Apply `op` once per match, returning how many times it fired
pub fn apply_all(
    op: &dyn SurgeryOp,
    tree: &mut Tree,
    matches: &[Match],
    ctx: &mut SurgeryContext,
) -> Result<usize, SurgeryError> {
    let mut fired = 0;
    for matched in matches {
        ctx.new_node_names.clear();
        if op.evaluate(tree, matched, ctx)?.is_some() {
            fired += 1;
        }
    }
    Ok(fired)
}

/// Parse a surgery command such as `adjoin (VP (ADVP (RB really)) VP@) vp`
pub fn parse_operation(input: &str) -> Result<Box<dyn SurgeryOp>, SurgeryError> {
    let mut pairs = SurgeryParser::parse(Rule::operation, input)?;
    let Some(command) = pairs.next().and_then(|op| op.into_inner().next()) else {
        return Err(SurgeryError::Argument("empty operation".to_string()));
    };

    match command.as_rule() {
        Rule::adjoin => {
            let mut inner = command.into_inner();
            let (Some(aux), Some(name)) = (inner.next(), inner.next()) else {
                return Err(SurgeryError::Argument(
                    "adjoin needs an auxiliary tree and a node name".to_string(),
                ));
            };
            let aux: AuxiliaryTree = aux.as_str().parse()?;
            Ok(Box::new(AdjoinNode::new(
                aux,
                Box::new(FetchNode::new(name.as_str())),
            )))
        }
        other => Err(SurgeryError::Argument(format!(
            "unsupported operation {other:?}"
        ))),
    }
}
