//! Tree normalization
//!
//! Brings raw treebank trees into a canonical form:
//! 1. nonterminal labels are reduced to basic categories, a null root becomes `ROOT`
//! 2. empty elements (`-NONE-` over a single leaf) are deleted
//! 3. nodes that no longer dominate any leaf are deleted
//! 4. unary A over A nodes are spliced out, and so are `EDITED` / `CODE` nodes
//!
//! Steps 2-3 are [`prune`], step 4 is [`splice_out`]. Both build a new
//! arena and leave the input untouched. Normalizing a normalized tree
//! returns the same tree.

use tracing::trace;

use crate::category::{
    CODE_CATEGORY, CategoryNormalizer, EDITED_CATEGORY, EMPTY_CATEGORY, PennCategories,
    ROOT_CATEGORY,
};
use crate::tree::{Label, NodeId, Tree, TreeError};

/// Keep/reject predicate over tree nodes
pub trait NodeFilter: Send + Sync {
    fn accept(&self, tree: &Tree, node: NodeId) -> bool;
}

impl<F> NodeFilter for F
where
    F: Fn(&Tree, NodeId) -> bool + Send + Sync,
{
    fn accept(&self, tree: &Tree, node: NodeId) -> bool {
        self(tree, node)
    }
}

/// Rejects empty elements: an `-NONE-` node directly over a single leaf
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyFilter;

impl NodeFilter for EmptyFilter {
    fn accept(&self, tree: &Tree, node: NodeId) -> bool {
        !(tree.value(node) == Some(EMPTY_CATEGORY) && tree.is_pre_terminal(node))
    }
}

/// Rejects unary A over A nodes, and `EDITED`/`CODE` nodes
///
/// Leaves and pre-terminals are always accepted.
#[derive(Debug, Clone, Copy, Default)]
pub struct AOverAFilter;

impl NodeFilter for AOverAFilter {
    fn accept(&self, tree: &Tree, node: NodeId) -> bool {
        if tree.is_leaf(node) || tree.is_pre_terminal(node) {
            return true;
        }
        let value = tree.value(node);
        if matches!(value, Some(EDITED_CATEGORY | CODE_CATEGORY)) {
            return false;
        }
        match tree.children(node) {
            [only] => !(value.is_some() && value == tree.value(*only)),
            _ => true,
        }
    }
}

/// Copy of `tree` without the subtrees `filter` rejects
///
/// Nodes are tested bottom-up: `filter` sees each node with its
/// already-pruned children. A node whose children were all removed is
/// removed as well. The result has no root if nothing survives.
pub fn prune(tree: &Tree, filter: &dyn NodeFilter) -> Result<Tree, TreeError> {
    let mut out = Tree::new();
    if let Some(root) = tree.root() {
        if let Some(copy) = prune_node(tree, root, filter, &mut out)? {
            out.set_root(copy)?;
        }
    }
    // rejected nodes are left behind as detached slots
    out.compact()
}

fn prune_node(
    tree: &Tree,
    id: NodeId,
    filter: &dyn NodeFilter,
    out: &mut Tree,
) -> Result<Option<NodeId>, TreeError> {
    let node = tree.node(id)?;
    let mut kept = Vec::with_capacity(node.children.len());
    for &child in &node.children {
        if let Some(copy) = prune_node(tree, child, filter, out)? {
            kept.push(copy);
        }
    }
    if kept.is_empty() && !node.children.is_empty() {
        trace!(label = %node.label, "pruned node left without children");
        return Ok(None);
    }

    let copy = out.add_node(node.label.clone());
    out.set_children(copy, kept)?;
    if !filter.accept(out, copy) {
        trace!(node = %out.render(copy), "pruned");
        return Ok(None);
    }
    Ok(Some(copy))
}

/// Copy of `tree` with the nodes `filter` rejects spliced out
///
/// A spliced node is replaced by its children in its parent's child list.
/// Nodes are rebuilt bottom-up and `filter` sees each node with its
/// already-spliced children, so chains exposed by splicing below collapse
/// too. If the root is spliced into several nodes they get a fresh
/// unlabeled root.
pub fn splice_out(tree: &Tree, filter: &dyn NodeFilter) -> Result<Tree, TreeError> {
    let mut out = Tree::new();
    let Some(root) = tree.root() else {
        return Ok(out);
    };

    let top = splice_node(tree, root, filter, &mut out)?;
    match top.as_slice() {
        [] => return Ok(Tree::new()),
        [only] => out.set_root(*only)?,
        _ => {
            let forest_root = out.add_node(Label::empty());
            out.set_children(forest_root, top)?;
            out.set_root(forest_root)?;
        }
    }
    // spliced nodes are left behind as detached slots
    out.compact()
}

fn splice_node(
    tree: &Tree,
    id: NodeId,
    filter: &dyn NodeFilter,
    out: &mut Tree,
) -> Result<Vec<NodeId>, TreeError> {
    let node = tree.node(id)?;
    let mut kids = Vec::with_capacity(node.children.len());
    for &child in &node.children {
        kids.extend(splice_node(tree, child, filter, out)?);
    }

    let copy = out.add_node(node.label.clone());
    out.set_children(copy, kids.clone())?;
    if filter.accept(out, copy) {
        return Ok(vec![copy]);
    }
    trace!(label = %node.label, "spliced out");
    out.set_children(copy, Vec::new())?;
    Ok(kids)
}

/// Normalization of labels and of whole trees
pub trait TreeNormalizer {
    /// Normalize a leaf; the identity unless overridden
    fn normalize_terminal(&self, leaf: &str) -> String {
        leaf.to_string()
    }

    /// Normalize a nonterminal category; a null or empty one becomes `ROOT`
    fn normalize_nonterminal(&self, category: Option<&str>) -> String;

    fn normalize_whole_tree(&self, tree: &Tree) -> Result<Tree, TreeError>;
}

/// Normalizer deleting empty elements and A over A nodes
pub struct BobChrisNormalizer {
    categories: Box<dyn CategoryNormalizer>,
    empty_filter: Box<dyn NodeFilter>,
    a_over_a_filter: Box<dyn NodeFilter>,
}

impl BobChrisNormalizer {
    pub fn new() -> Self {
        Self::with_categories(PennCategories::new())
    }

    pub fn with_categories(categories: impl CategoryNormalizer + 'static) -> Self {
        Self {
            categories: Box::new(categories),
            empty_filter: Box::new(EmptyFilter),
            a_over_a_filter: Box::new(AOverAFilter),
        }
    }

    /// Replace the prune and splice predicates
    pub fn with_filters(
        mut self,
        empty_filter: impl NodeFilter + 'static,
        a_over_a_filter: impl NodeFilter + 'static,
    ) -> Self {
        self.empty_filter = Box::new(empty_filter);
        self.a_over_a_filter = Box::new(a_over_a_filter);
        self
    }

    /// Copy of `tree` with every label normalized
    pub fn normalize_labels(&self, tree: &Tree) -> Result<Tree, TreeError> {
        let mut out = tree.compact()?;
        for id in 0..out.nodes.len() {
            let leaf = out.is_leaf(id);
            let label = out.label_mut(id)?;
            if leaf {
                label.value = label.value.as_deref().map(|v| self.normalize_terminal(v));
                label.word = label.word.as_deref().map(|w| self.normalize_terminal(w));
            } else {
                label.value = Some(self.normalize_nonterminal(label.value.as_deref()));
            }
        }
        Ok(out)
    }
}

impl Default for BobChrisNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeNormalizer for BobChrisNormalizer {
    fn normalize_nonterminal(&self, category: Option<&str>) -> String {
        match category {
            None | Some("") => ROOT_CATEGORY.to_string(),
            Some(label) => self.categories.basic_category(label),
        }
    }

    fn normalize_whole_tree(&self, tree: &Tree) -> Result<Tree, TreeError> {
        let labeled = self.normalize_labels(tree)?;
        let pruned = prune(&labeled, &*self.empty_filter)?;
        let mut spliced = splice_out(&pruned, &*self.a_over_a_filter)?;

        // a forest root made by splicing gets the root category too
        if let Some(root) = spliced.root() {
            let label = spliced.label_mut(root)?;
            if label.value.is_none() {
                label.value = Some(self.normalize_nonterminal(None));
            }
        }
        Ok(spliced)
    }
}
