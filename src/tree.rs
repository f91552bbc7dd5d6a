//! Constituency tree data structures
//!
//! Trees are stored as an arena: every node lives in `Tree::nodes` and is
//! addressed by its `NodeId`. Children are owned through the `children`
//! list of their parent; the `parent` field is a back-reference for
//! traversal only. A node has at most one parent: attaching it elsewhere
//! first removes it from its old parent's child list. Surgery can leave
//! detached slots behind; they are never reachable from the root and every
//! traversal here starts from a node id.

use std::fmt;
use thiserror::Error;

/// Unique identifier for a node (index into the arena)
pub type NodeId = usize;

/// Error during tree access or mutation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("Tree error: unknown node {0}")]
    UnknownNode(NodeId),

    #[error("Tree error: node {child} is not a child of node {parent}")]
    NotAChild { parent: NodeId, child: NodeId },

    #[error("Tree error: tree has no root")]
    NoRoot,

    #[error("Tree error: node {child} cannot be placed under node {parent}")]
    Ownership { parent: NodeId, child: NodeId },
}

/// Label of a constituent: a category (or word) value, plus the word for leaves
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Label {
    pub value: Option<String>,
    pub word: Option<String>,
}

impl Label {
    /// Create a category label
    pub fn new(value: &str) -> Self {
        Self {
            value: Some(value.to_string()),
            word: None,
        }
    }

    /// Create a word label (value and word both set)
    pub fn word(word: &str) -> Self {
        Self {
            value: Some(word.to_string()),
            word: Some(word.to_string()),
        }
    }

    /// Create a label with no value (an unset root)
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Plain-text projection: the word if there is one, else the value
    pub fn text(&self) -> &str {
        self.word
            .as_deref()
            .or(self.value.as_deref())
            .unwrap_or("")
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value.as_deref().unwrap_or(""))
    }
}

/// A node in a constituency tree
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub label: Label,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl Node {
    fn new(id: NodeId, label: Label) -> Self {
        Self {
            id,
            label,
            parent: None,
            children: Vec::new(),
        }
    }
}

/// A constituency tree (one sentence)
#[derive(Debug, Clone, Default)]
pub struct Tree {
    pub nodes: Vec<Node>,
    root: Option<NodeId>,
}

impl Tree {
    /// Create a new empty tree
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
        }
    }

    /// Add a detached node to the arena
    pub fn add_node(&mut self, label: Label) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node::new(id, label));
        id
    }

    /// Append `child` to the children of `parent`, moving it if it is attached elsewhere
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        self.check_placement(parent, child)?;
        self.detach(child);
        self.nodes[parent].children.push(child);
        self.nodes[child].parent = Some(parent);
        Ok(())
    }

    /// `child` may go under `parent` unless that would close a cycle
    fn check_placement(&self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        self.node(parent)?;
        self.node(child)?;
        let mut current = Some(parent);
        while let Some(id) = current {
            if id == child {
                return Err(TreeError::Ownership { parent, child });
            }
            current = self.nodes[id].parent;
        }
        Ok(())
    }

    /// Unlink `id` from its parent's child list; a detached root stops being the root
    fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id].parent.take() {
            self.nodes[parent].children.retain(|&c| c != id);
        }
        if self.root == Some(id) {
            self.root = None;
        }
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Make `id` the root of the tree, detaching it from any parent
    pub fn set_root(&mut self, id: NodeId) -> Result<(), TreeError> {
        self.node(id)?;
        self.detach(id);
        self.root = Some(id);
        Ok(())
    }

    pub fn clear_root(&mut self) {
        self.root = None;
    }

    /// Get a node by ID
    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node(&self, id: NodeId) -> Result<&Node, TreeError> {
        self.nodes.get(id).ok_or(TreeError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, TreeError> {
        self.nodes.get_mut(id).ok_or(TreeError::UnknownNode(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id < self.nodes.len()
    }

    pub fn label(&self, id: NodeId) -> Result<&Label, TreeError> {
        Ok(&self.node(id)?.label)
    }

    pub fn label_mut(&mut self, id: NodeId) -> Result<&mut Label, TreeError> {
        Ok(&mut self.node_mut(id)?.label)
    }

    /// Label value of a node; `None` for unknown nodes and unset labels
    pub fn value(&self, id: NodeId) -> Option<&str> {
        self.get_node(id).and_then(|n| n.label.value())
    }

    /// Children of a node (empty for leaves and unknown nodes)
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get_node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get_node(id).and_then(|n| n.parent)
    }

    pub fn num_children(&self, id: NodeId) -> usize {
        self.children(id).len()
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.children(id).is_empty()
    }

    /// A node whose only child is a leaf (a tag over a word)
    pub fn is_pre_terminal(&self, id: NodeId) -> bool {
        matches!(self.children(id), [only] if self.is_leaf(*only))
    }

    /// Whether `id` is reachable from the root through parent links
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            match self.parent(current) {
                Some(parent) => current = parent,
                None => return self.contains(id) && self.root == Some(current),
            }
        }
    }

    /// Replace `old` by `new` in the child list of `parent`, by identity
    ///
    /// Returns the position that was replaced. `old` is left detached and
    /// `new` is moved out of any other parent.
    pub fn replace_child(
        &mut self,
        parent: NodeId,
        old: NodeId,
        new: NodeId,
    ) -> Result<usize, TreeError> {
        self.node(parent)?;
        let not_a_child = TreeError::NotAChild { parent, child: old };
        let pos = self.child_position(parent, old).ok_or(not_a_child.clone())?;
        if new == old {
            return Ok(pos);
        }
        self.check_placement(parent, new)?;

        self.detach(new);
        let pos = self.child_position(parent, old).ok_or(not_a_child)?;
        self.nodes[parent].children[pos] = new;
        self.nodes[old].parent = None;
        self.nodes[new].parent = Some(parent);
        Ok(pos)
    }

    fn child_position(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        self.children(parent).iter().position(|&c| c == child)
    }

    /// Replace the whole child list of `id`
    ///
    /// The new children are moved out of their old parents. A node listed
    /// twice, or an ancestor of `id`, is rejected before anything changes.
    pub fn set_children(&mut self, id: NodeId, children: Vec<NodeId>) -> Result<(), TreeError> {
        self.node(id)?;
        for (i, &child) in children.iter().enumerate() {
            self.check_placement(id, child)?;
            if children[..i].contains(&child) {
                return Err(TreeError::Ownership { parent: id, child });
            }
        }
        let old = std::mem::take(&mut self.nodes[id].children);
        for child in old {
            self.nodes[child].parent = None;
        }
        for &child in &children {
            self.detach(child);
            self.nodes[child].parent = Some(id);
        }
        self.nodes[id].children = children;
        Ok(())
    }

    /// Deep-copy the subtree of `other` rooted at `src` into this arena
    ///
    /// Returns the id of the (detached) copy of `src`.
    pub fn graft(&mut self, other: &Tree, src: NodeId) -> Result<NodeId, TreeError> {
        self.graft_with(other, src, |_, _, _| {})
    }

    /// Like [`Tree::graft`], calling `visit(source_id, copy_id, &mut label)`
    /// for every copied node before its children are copied
    pub fn graft_with<F>(
        &mut self,
        other: &Tree,
        src: NodeId,
        mut visit: F,
    ) -> Result<NodeId, TreeError>
    where
        F: FnMut(NodeId, NodeId, &mut Label),
    {
        self.graft_node(other, src, &mut visit)
    }

    fn graft_node<F>(
        &mut self,
        other: &Tree,
        src: NodeId,
        visit: &mut F,
    ) -> Result<NodeId, TreeError>
    where
        F: FnMut(NodeId, NodeId, &mut Label),
    {
        let source = other.node(src)?;
        let copy = self.add_node(source.label.clone());
        visit(src, copy, &mut self.nodes[copy].label);
        for &child in &source.children {
            let child_copy = self.graft_node(other, child, visit)?;
            self.add_child(copy, child_copy)?;
        }
        Ok(copy)
    }

    /// Copy the subtree rooted at `id` into a fresh, compact tree
    pub fn subtree(&self, id: NodeId) -> Result<Tree, TreeError> {
        let mut tree = Tree::new();
        let root = tree.graft(self, id)?;
        tree.set_root(root)?;
        Ok(tree)
    }

    /// Copy of the reachable part of this tree, dropping detached slots
    pub fn compact(&self) -> Result<Tree, TreeError> {
        match self.root {
            Some(root) => self.subtree(root),
            None => Ok(Tree::new()),
        }
    }

    /// Node ids of the subtree rooted at `id`, in preorder
    pub fn preorder(&self, id: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        if !self.contains(id) {
            return order;
        }
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            order.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        order
    }

    /// Leaves of the subtree rooted at `id`, left to right
    pub fn leaves(&self, id: NodeId) -> Vec<NodeId> {
        self.preorder(id)
            .into_iter()
            .filter(|&n| self.is_leaf(n))
            .collect()
    }

    /// Words under `id`, left to right
    pub fn yield_words(&self, id: NodeId) -> Vec<&str> {
        self.leaves(id)
            .into_iter()
            .map(|n| self.nodes[n].label.text())
            .collect()
    }

    /// Number of nodes reachable from the root
    pub fn size(&self) -> usize {
        self.root.map(|r| self.preorder(r).len()).unwrap_or(0)
    }

    /// Same label values and same shape from the roots down
    pub fn same_shape(&self, other: &Tree) -> bool {
        match (self.root, other.root) {
            (None, None) => true,
            (Some(a), Some(b)) => self.same_subtree(a, other, b),
            _ => false,
        }
    }

    fn same_subtree(&self, a: NodeId, other: &Tree, b: NodeId) -> bool {
        let (ka, kb) = (self.children(a), other.children(b));
        self.value(a) == other.value(b)
            && ka.len() == kb.len()
            && ka
                .iter()
                .zip(kb)
                .all(|(&x, &y)| self.same_subtree(x, other, y))
    }

    /// Bracketed rendering of the subtree rooted at `id`
    pub fn render(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.render_into(id, &mut out);
        out
    }

    fn render_into(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.get_node(id) else {
            return;
        };
        if node.children.is_empty() {
            out.push_str(node.label.text());
            return;
        }
        out.push('(');
        out.push_str(node.label.value().unwrap_or(""));
        for &child in &node.children {
            out.push(' ');
            self.render_into(child, out);
        }
        out.push(')');
    }
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.root {
            Some(root) => f.write_str(&self.render(root)),
            None => f.write_str("()"),
        }
    }
}
