//! Head rule tables
//!
//! A rule table maps a mother category to an ordered sequence of
//! directives. Each directive is a traversal [`Mode`] plus the categories
//! it searches for (or, for the `except` modes, the categories it skips).
//! Categories are interned so that scanning children compares symbols.
//!
//! Tables are built in code with [`RuleTable::rule`] or read from a text
//! format with [`parse_rules`]:
//!
//! ```text
//! # mother  directive | directive ...
//! NP   rightdis NN NNP NNPS NNS NX POS JJR | left NP | right CD
//! VP   left TO VBD VBN MD VBZ VB VBG VBP VP ADJP NN NNS NP
//! *    left
//! ```

use lasso::{Rodeo, Spur};
use pest::Parser;
use pest_derive::Parser;
use rustc_hash::FxHashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Parser)]
#[grammar = "rules.pest"]
struct RulesParser;

/// Error type for rule table construction failures
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("Rule error: {0}")]
    Syntax(#[from] Box<pest::error::Error<Rule>>),

    #[error("Rule error: invalid traversal mode {0:?}")]
    UnknownMode(String),

    #[error("Rule error: empty directive")]
    EmptyDirective,

    #[error("Rule error: no directives for category {0}")]
    EmptyRule(String),

    #[error("Rule error: default rule must have exactly one directive, found {0}")]
    DefaultArity(usize),
}

impl From<pest::error::Error<Rule>> for RuleError {
    fn from(err: pest::error::Error<Rule>) -> Self {
        RuleError::Syntax(Box::new(err))
    }
}

/// Direction and matching discipline of a directive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Left to right by category, then by position
    Left,
    /// Left to right by position, then by category
    LeftDis,
    /// First child from the left that is not listed
    LeftExcept,
    Right,
    RightDis,
    RightExcept,
}

impl Mode {
    /// Whether the mode scans left to right
    pub fn is_left(self) -> bool {
        matches!(self, Mode::Left | Mode::LeftDis | Mode::LeftExcept)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Left => "left",
            Mode::LeftDis => "leftdis",
            Mode::LeftExcept => "leftexcept",
            Mode::Right => "right",
            Mode::RightDis => "rightdis",
            Mode::RightExcept => "rightexcept",
        }
    }
}

impl FromStr for Mode {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left" => Ok(Mode::Left),
            "leftdis" => Ok(Mode::LeftDis),
            "leftexcept" => Ok(Mode::LeftExcept),
            "right" => Ok(Mode::Right),
            "rightdis" => Ok(Mode::RightDis),
            "rightexcept" => Ok(Mode::RightExcept),
            _ => Err(RuleError::UnknownMode(s.to_string())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One search instruction over the children of a constituent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub mode: Mode,
    pub categories: Vec<Spur>,
}

impl Directive {
    pub fn new(mode: Mode, categories: Vec<Spur>) -> Self {
        Self { mode, categories }
    }

    fn lists(&self, category: Option<Spur>) -> bool {
        category.is_some_and(|c| self.categories.contains(&c))
    }

    /// Index of the child this directive selects, if any
    ///
    /// `children` holds the interned basic category of each child; `None`
    /// marks a category the table has never seen, which matches no listed
    /// category.
    pub fn scan(&self, children: &[Option<Spur>]) -> Option<usize> {
        match self.mode {
            Mode::Left => self
                .categories
                .iter()
                .find_map(|&c| children.iter().position(|&k| k == Some(c))),
            Mode::LeftDis => children.iter().position(|&k| self.lists(k)),
            Mode::LeftExcept => children.iter().position(|&k| !self.lists(k)),
            Mode::Right => self
                .categories
                .iter()
                .find_map(|&c| children.iter().rposition(|&k| k == Some(c))),
            Mode::RightDis => children.iter().rposition(|&k| self.lists(k)),
            Mode::RightExcept => children.iter().rposition(|&k| !self.lists(k)),
        }
    }
}

/// Mapping from mother category to its directive sequence
#[derive(Debug, Default)]
pub struct RuleTable {
    interner: Rodeo,
    rules: FxHashMap<Spur, Vec<Directive>>,
    default_rule: Option<Directive>,
}

impl RuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule in array form: each inner slice is `[mode, category...]`
    pub fn rule(mut self, category: &str, directives: &[&[&str]]) -> Result<Self, RuleError> {
        self.add_rule(category, directives)?;
        Ok(self)
    }

    /// Set the rule used for categories with no entry
    pub fn default_rule(mut self, directive: &[&str]) -> Result<Self, RuleError> {
        self.set_default_rule(directive)?;
        Ok(self)
    }

    pub fn add_rule(&mut self, category: &str, directives: &[&[&str]]) -> Result<(), RuleError> {
        if directives.is_empty() {
            return Err(RuleError::EmptyRule(category.to_string()));
        }
        let compiled = directives
            .iter()
            .map(|d| self.directive(d))
            .collect::<Result<Vec<_>, _>>()?;
        let key = self.interner.get_or_intern(category);
        self.rules.insert(key, compiled);
        Ok(())
    }

    pub fn set_default_rule(&mut self, directive: &[&str]) -> Result<(), RuleError> {
        self.default_rule = Some(self.directive(directive)?);
        Ok(())
    }

    /// Compile `[mode, category...]` into a directive, interning its categories
    pub fn directive(&mut self, parts: &[&str]) -> Result<Directive, RuleError> {
        let (mode, categories) = parts.split_first().ok_or(RuleError::EmptyDirective)?;
        Ok(self.directive_from(mode.parse()?, categories))
    }

    pub fn directive_from(&mut self, mode: Mode, categories: &[&str]) -> Directive {
        let categories = categories
            .iter()
            .map(|c| self.interner.get_or_intern(c))
            .collect();
        Directive::new(mode, categories)
    }

    /// Directive sequence for a mother category
    pub fn get(&self, category: &str) -> Option<&[Directive]> {
        let key = self.interner.get(category)?;
        self.rules.get(&key).map(|v| v.as_slice())
    }

    pub fn get_default_rule(&self) -> Option<&Directive> {
        self.default_rule.as_ref()
    }

    /// Symbol of a category, if it occurs anywhere in the table
    pub fn symbol(&self, category: &str) -> Option<Spur> {
        self.interner.get(category)
    }

    pub fn resolve(&self, symbol: &Spur) -> &str {
        self.interner.resolve(symbol)
    }

    /// Mother categories with an entry, in no particular order
    pub fn categories(&self) -> impl Iterator<Item = &str> + '_ {
        self.rules.keys().map(|k| self.interner.resolve(k))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Text rendering of a directive, e.g. `rightdis NN NNS`
    pub fn render(&self, directive: &Directive) -> String {
        let mut out = directive.mode.to_string();
        for c in &directive.categories {
            out.push(' ');
            out.push_str(self.interner.resolve(c));
        }
        out
    }
}

impl FromStr for RuleTable {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_rules(s)
    }
}

/// Parse a rule table from its text format
pub fn parse_rules(input: &str) -> Result<RuleTable, RuleError> {
    let mut pairs = RulesParser::parse(Rule::rules, input)?;
    let mut table = RuleTable::new();

    let Some(rules_pair) = pairs.next() else {
        return Ok(table);
    };

    for entry in rules_pair.into_inner() {
        if entry.as_rule() != Rule::entry {
            continue;
        }
        let mut inner = entry.into_inner();
        let Some(category) = inner.next().map(|p| p.as_str()) else {
            continue;
        };

        let mut directives = Vec::new();
        for directive in inner {
            let words: Vec<&str> = directive.into_inner().map(|p| p.as_str()).collect();
            directives.push(words);
        }
        let slices: Vec<&[&str]> = directives.iter().map(|d| d.as_slice()).collect();

        if category == "*" {
            match slices.as_slice() {
                [only] => table.set_default_rule(only)?,
                _ => return Err(RuleError::DefaultArity(slices.len())),
            }
        } else {
            table.add_rule(category, &slices)?;
        }
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbols(table: &RuleTable, cats: &[&str]) -> Vec<Option<Spur>> {
        cats.iter().map(|c| table.symbol(c)).collect()
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("leftdis".parse::<Mode>().unwrap(), Mode::LeftDis);
        assert_eq!(Mode::RightExcept.to_string(), "rightexcept");
        assert!(Mode::LeftExcept.is_left());
        assert!(!Mode::Right.is_left());
        assert!(matches!(
            "middle".parse::<Mode>(),
            Err(RuleError::UnknownMode(m)) if m == "middle"
        ));
    }

    #[test]
    fn test_left_searches_by_category_first() {
        let mut table = RuleTable::new();
        let dis = table.directive(&["leftdis", "X", "Y"]).unwrap();
        let left = table.directive(&["left", "X", "Y"]).unwrap();
        let kids = symbols(&table, &["Y", "X"]);

        assert_eq!(dis.scan(&kids), Some(0));
        assert_eq!(left.scan(&kids), Some(1));
    }

    #[test]
    fn test_right_family() {
        let mut table = RuleTable::new();
        let right = table.directive(&["right", "X", "Y"]).unwrap();
        let rightdis = table.directive(&["rightdis", "X", "Y"]).unwrap();
        let except = table.directive(&["rightexcept", "X"]).unwrap();
        let kids = symbols(&table, &["X", "Y", "Z"]);

        assert_eq!(right.scan(&kids), Some(0));
        assert_eq!(rightdis.scan(&kids), Some(1));
        // Z was never interned, so it is "not listed"
        assert_eq!(except.scan(&kids), Some(2));
    }

    #[test]
    fn test_except_and_no_match() {
        let mut table = RuleTable::new();
        let except = table.directive(&["leftexcept", "PUNCT", "DT"]).unwrap();
        let left = table.directive(&["left", "VB"]).unwrap();

        let kids = symbols(&table, &["PUNCT", "DT", "NN"]);
        assert_eq!(except.scan(&kids), Some(2));
        assert_eq!(left.scan(&kids), None);

        let all_avoided = symbols(&table, &["PUNCT", "DT"]);
        assert_eq!(except.scan(&all_avoided), None);

        let bare = table.directive(&["left"]).unwrap();
        assert_eq!(bare.scan(&kids), None);
    }

    #[test]
    fn test_builder_errors() {
        assert!(matches!(
            RuleTable::new().rule("NP", &[]),
            Err(RuleError::EmptyRule(c)) if c == "NP"
        ));
        assert!(matches!(
            RuleTable::new().rule("NP", &[&[]]),
            Err(RuleError::EmptyDirective)
        ));
        assert!(matches!(
            RuleTable::new().rule("NP", &[&["up", "NN"]]),
            Err(RuleError::UnknownMode(_))
        ));
    }

    #[test]
    fn test_parse_rules() {
        let table = parse_rules(
            "# Collins-style excerpt\n\
             NP   rightdis NN NNP NNS | left NP | right CD\n\
             \n\
             VP   left VBD VBZ VB VP\n\
             *    leftexcept PUNCT\n",
        )
        .unwrap();

        assert_eq!(table.len(), 2);
        let np = table.get("NP").unwrap();
        assert_eq!(np.len(), 3);
        assert_eq!(np[0].mode, Mode::RightDis);
        assert_eq!(table.render(&np[0]), "rightdis NN NNP NNS");
        assert_eq!(table.render(&np[2]), "right CD");
        assert!(table.get("PP").is_none());
        assert_eq!(
            table.render(table.get_default_rule().unwrap()),
            "leftexcept PUNCT"
        );

        let mut cats: Vec<_> = table.categories().collect();
        cats.sort();
        assert_eq!(cats, vec!["NP", "VP"]);
    }

    #[test]
    fn test_trailing_comments() {
        let table = parse_rules(
            "NP   rightdis NN NNS # plural nouns\n\
             VP   left VBD | right VP #last resort\n\
             *    left # anything else\n",
        )
        .unwrap();

        assert_eq!(table.render(&table.get("NP").unwrap()[0]), "rightdis NN NNS");
        let vp = table.get("VP").unwrap();
        assert_eq!(vp.len(), 2);
        assert_eq!(table.render(&vp[1]), "right VP");
        assert_eq!(table.render(table.get_default_rule().unwrap()), "left");
        assert!(table.symbol("#").is_none());
        assert!(table.symbol("plural").is_none());
    }

    #[test]
    fn test_parse_rules_errors() {
        assert!(matches!(
            parse_rules("NP sideways NN"),
            Err(RuleError::UnknownMode(_))
        ));
        assert!(matches!(
            parse_rules("* left | right"),
            Err(RuleError::DefaultArity(2))
        ));
        assert!(matches!(parse_rules("NP"), Err(RuleError::Syntax(_))));
        assert!(parse_rules("").unwrap().is_empty());
    }
}
