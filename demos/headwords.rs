//! Complete pipeline example: brackets → normalize → heads → adjunction
//!
//! This example demonstrates:
//! 1. Reading a head rule table from text
//! 2. Reading and normalizing a Penn Treebank tree
//! 3. Finding heads and word-to-word dependencies
//! 4. Adjoining an auxiliary tree at a matched node
//!
//! Run with: RUST_LOG=debug cargo run --example headwords

use constree::{
    BobChrisNormalizer, DependencyFormat, HeadFinder, Match, SurgeryContext, TreeNormalizer,
    parse_operation, parse_rules, read_tree,
};
use tracing_subscriber::EnvFilter;

const RULES: &str = "\
# mother  directive | directive ...
ROOT  left S SINV SQ
S     left TO IN VP S SBAR ADJP UCP NP
VP    left TO VBD VBN MD VBZ VB VBG VBP VP ADJP NN NNS NP
NP    rightdis NN NNP NNPS NNS NX POS JJR | left NP | rightdis $ ADJP PRN | right CD | rightdis JJ JJS RB QP
ADVP  right RB RBR RBS FW ADVP TO CD JJR JJ IN NP JJS NN
PP    right IN TO VBG VBN RP FW
*     left
";

const SENTENCE: &str = "( (S (NP-SBJ-1 (DT The) (JJ old) (NN man)) \
    (VP (VBD saw) (NP (-NONE- *T*-1)) (NP (NNP John))) (. .)))";

fn main() -> Result<(), constree::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Constree: Head Words Example ===\n");

    // Step 1: Head rules
    let rules = parse_rules(RULES)?;
    println!("Loaded head rules for {} categories", rules.len());
    let finder = HeadFinder::builder()
        .rules(rules)
        .categories_to_avoid(&["."])
        .build();

    // Step 2: Read and normalize
    let raw = read_tree(SENTENCE)?;
    println!("\nInput:      {raw}");
    let tree = BobChrisNormalizer::new().normalize_whole_tree(&raw)?;
    println!("Normalized: {tree}");

    let root = tree.root().ok_or(constree::TreeError::NoRoot)?;

    // Step 3: Heads and dependencies
    let head_word = finder.head_terminal(&tree, root)?;
    println!("\nHead word of the sentence: {}", tree.label(head_word)?.text());

    println!("\nDependencies:");
    for dep in finder.dependencies(&tree, root)? {
        println!("  {dep}    {}", dep.to_string_as(DependencyFormat::Predicate));
    }

    // Step 4: Adjoin an adverb above the VP
    let op = parse_operation("adjoin (VP (ADVP (RB really)) VP@) vp")?;
    println!("\nOperation: {op}");

    let mut tree = tree;
    let vp = tree
        .preorder(root)
        .into_iter()
        .find(|&n| tree.value(n) == Some("VP"));
    let mut ctx = SurgeryContext::for_tree(&tree);
    if let Some(vp) = vp {
        op.evaluate(&mut tree, &Match::new().with("vp", vp), &mut ctx)?;
    }
    println!("Adjoined:   {tree}");

    Ok(())
}
