//! Rule-driven head finding
//!
//! For a constituent with several children, the mother's basic category
//! selects a directive sequence from the [`RuleTable`]. Directives are tried
//! in order and the first one that selects a child wins:
//!
//! ```text
//! for directive in rules[mother]
//!   left:     for category in directive, for child L->R: category == child?
//!   leftdis:  for child L->R, for category in directive: category == child?
//!   leftexcept: first child L->R not in directive
//!   (right* modes mirror these R->L)
//! ```
//!
//! Only the last directive of a sequence may fall back when nothing
//! matches. It then prefers the outermost child that is not in the
//! categories to avoid, and takes the boundary child if every child is one
//! to avoid.

use lasso::Spur;
use thiserror::Error;
use tracing::{debug, trace};

use crate::category::{CategoryNormalizer, PennCategories};
use crate::dependency::Dependency;
use crate::rules::{Directive, Mode, RuleTable};
use crate::tree::{NodeId, Tree};

/// Error during head finding
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HeadError {
    #[error("Head error: no head rule table configured")]
    RulesUnset,

    #[error("Head error: no head rule defined for {category} in {node}")]
    NoRule { category: String, node: String },

    #[error("Head error: can't find the head of leaf node {0}")]
    LeafNode(NodeId),

    #[error("Head error: unknown node {0}")]
    UnknownNode(NodeId),
}

/// Specialization points for head finders following other conventions
///
/// Every hook has a no-op default; [`NoHooks`] uses them all.
pub trait HeadHooks: Send + Sync {
    /// Head marked explicitly in the corpus, if any
    fn find_marked_head(&self, _tree: &Tree, _node: NodeId) -> Option<NodeId> {
        None
    }

    /// Adjust a selected head index; runs exactly once per head decision
    fn post_operation_fix(&self, head_idx: usize, _children: &[NodeId], _tree: &Tree) -> usize {
        head_idx
    }

    /// Whether copulas are treated as heads
    fn makes_copula_head(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl HeadHooks for NoHooks {}

/// Builder for [`HeadFinder`]
#[derive(Default)]
pub struct HeadFinderBuilder {
    rules: Option<RuleTable>,
    avoid: Vec<String>,
    normalizer: Option<Box<dyn CategoryNormalizer>>,
    hooks: Option<Box<dyn HeadHooks>>,
}

impl HeadFinderBuilder {
    pub fn rules(mut self, rules: RuleTable) -> Self {
        self.rules = Some(rules);
        self
    }

    /// Categories that last-resort processing avoids choosing as heads
    pub fn categories_to_avoid(mut self, categories: &[&str]) -> Self {
        self.avoid = categories.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn normalizer(mut self, normalizer: impl CategoryNormalizer + 'static) -> Self {
        self.normalizer = Some(Box::new(normalizer));
        self
    }

    pub fn hooks(mut self, hooks: impl HeadHooks + 'static) -> Self {
        self.hooks = Some(Box::new(hooks));
        self
    }

    pub fn build(self) -> HeadFinder {
        let mut rules = self.rules;
        let avoid: Vec<&str> = self.avoid.iter().map(String::as_str).collect();
        let (left, right) = if avoid.is_empty() {
            (Mode::Left, Mode::Right)
        } else {
            (Mode::LeftExcept, Mode::RightExcept)
        };
        // the synthesized rules share the table's interner
        let (default_left, default_right) = match rules.as_mut() {
            Some(table) => (
                table.directive_from(left, &avoid),
                table.directive_from(right, &avoid),
            ),
            None => (Directive::new(left, Vec::new()), Directive::new(right, Vec::new())),
        };

        HeadFinder {
            rules,
            normalizer: self
                .normalizer
                .unwrap_or_else(|| Box::new(PennCategories::new())),
            hooks: self.hooks.unwrap_or_else(|| Box::new(NoHooks)),
            default_left,
            default_right,
        }
    }
}

/// Head finder driven by a [`RuleTable`]
pub struct HeadFinder {
    rules: Option<RuleTable>,
    normalizer: Box<dyn CategoryNormalizer>,
    hooks: Box<dyn HeadHooks>,
    default_left: Directive,
    default_right: Directive,
}

impl HeadFinder {
    pub fn builder() -> HeadFinderBuilder {
        HeadFinderBuilder::default()
    }

    /// Head finder over `rules` with Penn categories and no categories to avoid
    pub fn new(rules: RuleTable) -> Self {
        Self::builder().rules(rules).build()
    }

    pub fn rules(&self) -> Option<&RuleTable> {
        self.rules.as_ref()
    }

    /// Synthesized last-resort directives `(left, right)`
    pub fn default_directives(&self) -> (&Directive, &Directive) {
        (&self.default_left, &self.default_right)
    }

    pub fn makes_copula_head(&self) -> bool {
        self.hooks.makes_copula_head()
    }

    /// Determine which child of `node` is its head
    pub fn determine_head(&self, tree: &Tree, node: NodeId) -> Result<NodeId, HeadError> {
        self.determine_head_with_parent(tree, node, None)
    }

    /// Like [`HeadFinder::determine_head`]; `parent` is only passed on for
    /// specialized finders and does not affect rule-based selection
    pub fn determine_head_with_parent(
        &self,
        tree: &Tree,
        node: NodeId,
        _parent: Option<NodeId>,
    ) -> Result<NodeId, HeadError> {
        let rules = self.rules.as_ref().ok_or(HeadError::RulesUnset)?;
        let kids = &tree.get_node(node).ok_or(HeadError::UnknownNode(node))?.children;
        if kids.is_empty() {
            return Err(HeadError::LeafNode(node));
        }

        if let Some(marked) = self.hooks.find_marked_head(tree, node) {
            return Ok(marked);
        }

        // a unary node's only child is its head
        if let [only] = kids.as_slice() {
            return Ok(*only);
        }

        self.determine_non_trivial_head(rules, tree, node, kids)
    }

    fn determine_non_trivial_head(
        &self,
        rules: &RuleTable,
        tree: &Tree,
        node: NodeId,
        kids: &[NodeId],
    ) -> Result<NodeId, HeadError> {
        let basic = self.normalizer.basic_category(tree.value(node).unwrap_or(""));
        // "@" marks an uninterrupted continuation of the phrase
        let mother = basic.strip_prefix('@').unwrap_or(basic.as_str());

        let Some(how) = rules.get(mother) else {
            let Some(default) = rules.get_default_rule() else {
                return Err(HeadError::NoRule {
                    category: mother.to_string(),
                    node: tree.render(node),
                });
            };
            debug!(category = mother, "no head rule, using the default rule");
            return self
                .locate(rules, tree, kids, default, true)
                .ok_or_else(|| HeadError::NoRule {
                    category: mother.to_string(),
                    node: tree.render(node),
                });
        };

        let last = how.len().saturating_sub(1);
        how.iter()
            .enumerate()
            .find_map(|(i, directive)| self.locate(rules, tree, kids, directive, i == last))
            .ok_or_else(|| HeadError::NoRule {
                category: mother.to_string(),
                node: tree.render(node),
            })
    }

    /// Apply one directive to `children`
    ///
    /// Returns `Ok(None)` when the directive matches nothing and is not the
    /// last resort.
    pub fn traverse_locate(
        &self,
        tree: &Tree,
        children: &[NodeId],
        directive: &Directive,
        last_resort: bool,
    ) -> Result<Option<NodeId>, HeadError> {
        let rules = self.rules.as_ref().ok_or(HeadError::RulesUnset)?;
        Ok(self.locate(rules, tree, children, directive, last_resort))
    }

    fn locate(
        &self,
        rules: &RuleTable,
        tree: &Tree,
        children: &[NodeId],
        directive: &Directive,
        last_resort: bool,
    ) -> Option<NodeId> {
        if children.is_empty() {
            return None;
        }
        let categories: Vec<Option<Spur>> = children
            .iter()
            .map(|&k| rules.symbol(&self.normalizer.basic_category(tree.value(k).unwrap_or(""))))
            .collect();

        let head_idx = match directive.scan(&categories) {
            Some(idx) => idx,
            None if !last_resort => return None,
            None => {
                let (boundary, fallback) = if directive.mode.is_left() {
                    (0, &self.default_left)
                } else {
                    (children.len() - 1, &self.default_right)
                };
                // scanned directly so the post-fix below still runs only once
                let avoided = fallback.scan(&categories);
                trace!(
                    mode = %directive.mode,
                    boundary,
                    avoided = ?avoided,
                    "last resort head selection"
                );
                avoided.unwrap_or(boundary)
            }
        };

        let fixed = self.hooks.post_operation_fix(head_idx, children, tree);
        children.get(fixed).or(children.get(head_idx)).copied()
    }

    /// Follow head children down to the head word (a leaf)
    pub fn head_terminal(&self, tree: &Tree, node: NodeId) -> Result<NodeId, HeadError> {
        if !tree.contains(node) {
            return Err(HeadError::UnknownNode(node));
        }
        let mut current = node;
        while !tree.is_leaf(current) {
            current = self.determine_head(tree, current)?;
        }
        Ok(current)
    }

    /// Follow head children down to the head tag (a pre-terminal)
    pub fn head_pre_terminal(&self, tree: &Tree, node: NodeId) -> Result<NodeId, HeadError> {
        let mut current = node;
        while !tree.is_pre_terminal(current) {
            current = self.determine_head(tree, current)?;
        }
        Ok(current)
    }

    /// Word-level dependencies induced by head decisions
    ///
    /// Every constituent with several children contributes one edge from
    /// its head word to the head word of each non-head child. Edges come
    /// out in preorder, children left to right.
    pub fn dependencies(&self, tree: &Tree, root: NodeId) -> Result<Vec<Dependency>, HeadError> {
        if !tree.contains(root) {
            return Err(HeadError::UnknownNode(root));
        }
        let mut deps = Vec::new();
        for node in tree.preorder(root) {
            if tree.num_children(node) < 2 {
                continue;
            }
            let head_child = self.determine_head(tree, node)?;
            let head_word = self.head_terminal(tree, head_child)?;
            for &child in tree.children(node) {
                if child == head_child {
                    continue;
                }
                let dep_word = self.head_terminal(tree, child)?;
                deps.push(Dependency::new(
                    tree.nodes[head_word].label.clone(),
                    tree.nodes[dep_word].label.clone(),
                ));
            }
        }
        Ok(deps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read_tree;
    use proptest::prelude::*;

    fn finder(table: RuleTable, avoid: &[&str]) -> HeadFinder {
        HeadFinder::builder()
            .rules(table)
            .categories_to_avoid(avoid)
            .build()
    }

    fn collins_excerpt() -> RuleTable {
        RuleTable::new()
            .rule("S", &[&["left", "TO", "IN", "VP", "S", "SBAR", "ADJP", "UCP", "NP"]])
            .unwrap()
            .rule(
                "VP",
                &[&["left", "TO", "VBD", "VBN", "MD", "VBZ", "VB", "VBG", "VBP", "VP", "NP"]],
            )
            .unwrap()
            .rule(
                "NP",
                &[
                    &["rightdis", "NN", "NNP", "NNPS", "NNS", "NX", "POS", "JJR"],
                    &["left", "NP"],
                    &["rightdis", "$", "ADJP", "PRN"],
                    &["right", "CD"],
                    &["rightdis", "JJ", "JJS", "RB", "QP"],
                ],
            )
            .unwrap()
            .rule("PP", &[&["right", "IN", "TO", "VBG", "VBN", "RP", "FW"]])
            .unwrap()
    }

    fn head_value(hf: &HeadFinder, tree: &Tree, node: NodeId) -> String {
        let head = hf.determine_head(tree, node).unwrap();
        tree.value(head).unwrap_or("").to_string()
    }

    #[test]
    fn test_collins_heads() {
        let hf = finder(collins_excerpt(), &[]);
        let tree = read_tree(
            "(S (NP-SBJ (DT the) (JJ old) (NN man)) (VP (VBD saw) (NP (DT a) (NN dog))) (. .))",
        )
        .unwrap();
        let root = tree.root().unwrap();
        let subject = tree.children(root)[0];

        assert_eq!(head_value(&hf, &tree, root), "VP");
        assert_eq!(head_value(&hf, &tree, subject), "NN");

        let word = hf.head_terminal(&tree, root).unwrap();
        assert_eq!(tree.label(word).unwrap().text(), "saw");
        let tag = hf.head_pre_terminal(&tree, root).unwrap();
        assert_eq!(tree.value(tag), Some("VBD"));
    }

    #[test]
    fn test_first_directive_wins() {
        // both directives would match; the earlier one decides
        let table = RuleTable::new()
            .rule("X", &[&["left", "B"], &["left", "A"]])
            .unwrap();
        let hf = finder(table, &[]);
        let tree = read_tree("(X (A a) (B b))").unwrap();

        assert_eq!(head_value(&hf, &tree, tree.root().unwrap()), "B");
    }

    #[test]
    fn test_leftdis_versus_left() {
        let mut table = RuleTable::new();
        let dis = table.directive(&["leftdis", "X", "Y"]).unwrap();
        let left = table.directive(&["left", "X", "Y"]).unwrap();
        let hf = finder(table, &[]);
        let tree = read_tree("(Z (Y y) (X x))").unwrap();
        let kids = tree.children(tree.root().unwrap()).to_vec();

        assert_eq!(hf.traverse_locate(&tree, &kids, &dis, false).unwrap(), Some(kids[0]));
        assert_eq!(hf.traverse_locate(&tree, &kids, &left, false).unwrap(), Some(kids[1]));
    }

    #[test]
    fn test_no_match_is_not_last_resort() {
        let mut table = RuleTable::new();
        let left = table.directive(&["left", "VB"]).unwrap();
        let hf = finder(table, &[]);
        let tree = read_tree("(Z (NN a) (NN b))").unwrap();
        let kids = tree.children(tree.root().unwrap()).to_vec();

        assert_eq!(hf.traverse_locate(&tree, &kids, &left, false).unwrap(), None);
        assert_eq!(hf.traverse_locate(&tree, &kids, &left, true).unwrap(), Some(kids[0]));
    }

    #[test]
    fn test_last_resort_prefers_unavoided_child() {
        let table = RuleTable::new()
            .rule("R", &[&["right", "VB"]])
            .unwrap()
            .rule("L", &[&["left", "VB"]])
            .unwrap();
        let hf = finder(table, &["PUNCT"]);

        let right = read_tree("(R (PUNCT ,) (NP (NN x)))").unwrap();
        assert_eq!(head_value(&hf, &right, right.root().unwrap()), "NP");
        let right = read_tree("(R (NP (NN x)) (PUNCT ,))").unwrap();
        assert_eq!(head_value(&hf, &right, right.root().unwrap()), "NP");

        let left = read_tree("(L (PUNCT ,) (NP (NN x)))").unwrap();
        assert_eq!(head_value(&hf, &left, left.root().unwrap()), "NP");
    }

    #[test]
    fn test_last_resort_boundary_when_all_avoided() {
        let table = RuleTable::new().rule("R", &[&["right", "VB"]]).unwrap();
        let hf = finder(table, &["PUNCT"]);
        let tree = read_tree("(R (PUNCT ,) (PUNCT .))").unwrap();
        let root = tree.root().unwrap();

        assert_eq!(hf.determine_head(&tree, root).unwrap(), tree.children(root)[1]);
    }

    #[test]
    fn test_synthesized_rules() {
        let hf = finder(RuleTable::new(), &["PUNCT", ":"]);
        let (left, right) = hf.default_directives();
        let table = hf.rules().unwrap();
        assert_eq!(table.render(left), "leftexcept PUNCT :");
        assert_eq!(table.render(right), "rightexcept PUNCT :");

        let plain = finder(RuleTable::new(), &[]);
        let (left, right) = plain.default_directives();
        assert_eq!(left.mode, Mode::Left);
        assert!(left.categories.is_empty());
        assert_eq!(right.mode, Mode::Right);
    }

    #[test]
    fn test_annotations_and_continuations_are_stripped() {
        let hf = finder(collins_excerpt(), &[]);
        let tree = read_tree("(@NP-SBJ (DT the) (NN-HL dog) (NNS-1 dogs) (CD 3))").unwrap();

        // NNS is rightmost of the rightdis candidates once tags are stripped
        assert_eq!(head_value(&hf, &tree, tree.root().unwrap()), "NNS-1");
    }

    #[test]
    fn test_default_rule() {
        let table = RuleTable::new().default_rule(&["right", "NN"]).unwrap();
        let hf = finder(table, &["PUNCT"]);

        let tree = read_tree("(FRAG (NN a) (JJ b))").unwrap();
        assert_eq!(head_value(&hf, &tree, tree.root().unwrap()), "NN");

        // the default rule is a last resort too
        let tree = read_tree("(FRAG (JJ a) (PUNCT .))").unwrap();
        assert_eq!(head_value(&hf, &tree, tree.root().unwrap()), "JJ");
    }

    #[test]
    fn test_errors() {
        let unset = HeadFinder::builder().build();
        let tree = read_tree("(S (NP (NN a)) (VP (VB b)))").unwrap();
        let root = tree.root().unwrap();
        assert_eq!(unset.determine_head(&tree, root), Err(HeadError::RulesUnset));

        let hf = finder(collins_excerpt(), &[]);
        let leaf = tree.leaves(root)[0];
        assert_eq!(hf.determine_head(&tree, leaf), Err(HeadError::LeafNode(leaf)));
        assert_eq!(hf.determine_head(&tree, 999), Err(HeadError::UnknownNode(999)));

        let frag = read_tree("(FRAG (NN a) (JJ b))").unwrap();
        match hf.determine_head(&frag, frag.root().unwrap()) {
            Err(HeadError::NoRule { category, node }) => {
                assert_eq!(category, "FRAG");
                assert_eq!(node, "(FRAG (NN a) (JJ b))");
            }
            other => panic!("expected NoRule, got {other:?}"),
        }
    }

    struct Marked;

    impl HeadHooks for Marked {
        fn find_marked_head(&self, tree: &Tree, node: NodeId) -> Option<NodeId> {
            tree.children(node)
                .iter()
                .copied()
                .find(|&k| tree.value(k).is_some_and(|v| v.ends_with("-H")))
        }

        fn makes_copula_head(&self) -> bool {
            true
        }
    }

    #[test]
    fn test_marked_head_hook() {
        let hf = HeadFinder::builder()
            .rules(collins_excerpt())
            .hooks(Marked)
            .build();
        let tree = read_tree("(S (NP-H (NN a)) (VP (VB b)))").unwrap();

        assert_eq!(head_value(&hf, &tree, tree.root().unwrap()), "NP-H");
        assert!(hf.makes_copula_head());
        assert!(!finder(RuleTable::new(), &[]).makes_copula_head());
    }

    /// Shifts every decision one child to the right, counting its calls
    struct ShiftRight(std::sync::atomic::AtomicUsize);

    impl HeadHooks for ShiftRight {
        fn post_operation_fix(&self, head_idx: usize, children: &[NodeId], _tree: &Tree) -> usize {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            (head_idx + 1).min(children.len() - 1)
        }
    }

    #[test]
    fn test_post_operation_fix_runs_once() {
        let table = RuleTable::new().rule("X", &[&["left", "VB"]]).unwrap();
        let hooks = std::sync::Arc::new(ShiftRight(Default::default()));

        struct Shared(std::sync::Arc<ShiftRight>);
        impl HeadHooks for Shared {
            fn post_operation_fix(&self, i: usize, c: &[NodeId], t: &Tree) -> usize {
                self.0.post_operation_fix(i, c, t)
            }
        }

        let hf = HeadFinder::builder()
            .rules(table)
            .categories_to_avoid(&["PUNCT"])
            .hooks(Shared(hooks.clone()))
            .build();

        // last resort through the avoid rule: PUNCT skipped to index 1, then shifted
        let tree = read_tree("(X (PUNCT ,) (NN a) (NN b))").unwrap();
        let root = tree.root().unwrap();
        assert_eq!(hf.determine_head(&tree, root).unwrap(), tree.children(root)[2]);
        assert_eq!(hooks.0.load(std::sync::atomic::Ordering::SeqCst), 1);

        // last resort to the bare boundary
        let tree = read_tree("(X (PUNCT ,) (PUNCT .))").unwrap();
        let root = tree.root().unwrap();
        assert_eq!(hf.determine_head(&tree, root).unwrap(), tree.children(root)[1]);
        assert_eq!(hooks.0.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[test]
    fn test_dependencies() {
        let hf = finder(collins_excerpt(), &[]);
        let tree = read_tree("(S (NP (DT the) (NN man)) (VP (VBD saw) (NP (NNP John))))").unwrap();
        let deps = hf.dependencies(&tree, tree.root().unwrap()).unwrap();
        let rendered: Vec<String> = deps.iter().map(|d| d.to_string()).collect();

        assert_eq!(
            rendered,
            vec!["saw --> man", "man --> the", "saw --> John"]
        );
    }

    fn arb_label() -> impl Strategy<Value = String> {
        prop::sample::select(vec!["NP", "VP", "S", "PP", "FRAG", "NN", "-NONE-"])
            .prop_map(str::to_string)
    }

    proptest! {
        #[test]
        fn unary_child_is_always_the_head(mother in arb_label(), child in arb_label()) {
            let hf = finder(RuleTable::new(), &[]);
            let tree = read_tree(&format!("({mother} ({child} w))")).unwrap();
            let root = tree.root().unwrap();
            prop_assert_eq!(hf.determine_head(&tree, root).unwrap(), tree.children(root)[0]);
        }
    }
}
