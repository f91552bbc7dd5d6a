//! Bracketed tree reader
//!
//! Reads Penn Treebank style bracket notation into [`Tree`]s using a pest
//! grammar. A bracket with no label, as in `( (S ...))`, gives a root with
//! an unset label.

use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;
use thiserror::Error;

use crate::tree::{Label, NodeId, Tree, TreeError};

#[derive(Parser)]
#[grammar = "treebank.pest"]
struct TreebankParser;

/// Error type for tree reading failures
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("Read error: {0}")]
    Syntax(#[from] pest::error::Error<Rule>),

    #[error("Read error: no tree found")]
    Empty,

    #[error("Read error: {0}")]
    Tree(#[from] TreeError),
}

/// Read exactly one bracketed tree
pub fn read_tree(input: &str) -> Result<Tree, ReadError> {
    let mut pairs = TreebankParser::parse(Rule::single, input)?;
    let tree_pair = pairs
        .next()
        .and_then(|single| single.into_inner().find(|p| p.as_rule() == Rule::tree))
        .ok_or(ReadError::Empty)?;
    build_tree(tree_pair)
}

/// Read a whitespace-separated sequence of bracketed trees
pub fn read_trees(input: &str) -> Result<Vec<Tree>, ReadError> {
    let mut pairs = TreebankParser::parse(Rule::forest, input)?;
    let Some(forest) = pairs.next() else {
        return Ok(Vec::new());
    };
    forest
        .into_inner()
        .filter(|p| p.as_rule() == Rule::tree)
        .map(build_tree)
        .collect()
}

fn build_tree(pair: Pair<Rule>) -> Result<Tree, ReadError> {
    let mut tree = Tree::new();
    let root = build_node(pair, &mut tree)?;
    tree.set_root(root)?;
    Ok(tree)
}

fn build_node(pair: Pair<Rule>, tree: &mut Tree) -> Result<NodeId, ReadError> {
    match pair.as_rule() {
        Rule::leaf => Ok(tree.add_node(Label::word(pair.as_str()))),
        _ => {
            let id = tree.add_node(Label::empty());
            for inner in pair.into_inner() {
                if inner.as_rule() == Rule::label {
                    tree.label_mut(id)?.value = Some(inner.as_str().to_string());
                } else {
                    let child = build_node(inner, tree)?;
                    tree.add_child(id, child)?;
                }
            }
            Ok(id)
        }
    }
}
