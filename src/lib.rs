//! Constree: head finding, normalization and surgery for constituency trees
//!
//! A toolkit for Penn Treebank style phrase-structure parses:
//! rule-driven head finding and word-to-word dependencies, the standard
//! evaluation-time tree normalization, and TAG-style adjunction.

pub mod category; // Basic categories and annotation stripping
pub mod dependency; // Governor/dependent pairs
pub mod head; // Rule-driven head finder
pub mod normalize; // Label relabeling, pruning and splicing
pub mod reader; // Bracketed tree reader
pub mod rules; // Head rule tables
pub mod surgery; // Tree surgery (adjunction)
pub mod tree; // Arena constituency trees

use thiserror::Error;

// Re-exports for convenience
pub use category::{CategoryNormalizer, PennCategories};
pub use dependency::{Dependency, DependencyFormat};
pub use head::{HeadError, HeadFinder, HeadFinderBuilder, HeadHooks, NoHooks};
pub use normalize::{AOverAFilter, BobChrisNormalizer, EmptyFilter, NodeFilter, TreeNormalizer};
pub use reader::{ReadError, read_tree, read_trees};
pub use rules::{Directive, Mode, RuleError, RuleTable, parse_rules};
pub use surgery::{
    AdjoinNode, AuxiliaryTree, FetchNode, Match, SurgeryContext, SurgeryError, SurgeryOp,
    apply_all, parse_operation,
};
pub use tree::{Label, Node, NodeId, Tree, TreeError};

/// Any error from this crate
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Read(#[from] ReadError),

    #[error(transparent)]
    Rules(#[from] RuleError),

    #[error(transparent)]
    Head(#[from] HeadError),

    #[error(transparent)]
    Surgery(#[from] SurgeryError),
}
