//! Unnamed word-to-word dependencies
//!
//! Equality and hashing use the plain text of each side (the word if the
//! label has one, else its value), cached at construction, so two
//! dependencies built from different labels with the same text are equal.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::tree::Label;

/// Output formats for [`Dependency::to_string_as`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DependencyFormat {
    /// `saw --> John`
    #[default]
    Plain,
    /// `<dep>` element with governor and dependent values
    Xml,
    /// `dep(saw,John)`
    Predicate,
}

/// A dependency between a governor and a dependent
#[derive(Debug, Clone)]
pub struct Dependency {
    governor: Label,
    dependent: Label,
    governor_text: String,
    dependent_text: String,
}

impl Dependency {
    pub fn new(governor: Label, dependent: Label) -> Self {
        let governor_text = governor.text().to_string();
        let dependent_text = dependent.text().to_string();
        Self {
            governor,
            dependent,
            governor_text,
            dependent_text,
        }
    }

    /// Dependency between two bare words
    pub fn from_words(governor: &str, dependent: &str) -> Self {
        Self::new(Label::word(governor), Label::word(dependent))
    }

    pub fn governor(&self) -> &Label {
        &self.governor
    }

    pub fn dependent(&self) -> &Label {
        &self.dependent
    }

    pub fn governor_text(&self) -> &str {
        &self.governor_text
    }

    pub fn dependent_text(&self) -> &str {
        &self.dependent_text
    }

    pub fn to_string_as(&self, format: DependencyFormat) -> String {
        match format {
            DependencyFormat::Plain => self.to_string(),
            DependencyFormat::Xml => format!(
                "  <dep>\n    <governor>{}</governor>\n    <dependent>{}</dependent>\n  </dep>",
                xml_escape(self.governor.value().unwrap_or("")),
                xml_escape(self.dependent.value().unwrap_or(""))
            ),
            DependencyFormat::Predicate => {
                format!("dep({},{})", self.governor_text, self.dependent_text)
            }
        }
    }
}

impl PartialEq for Dependency {
    fn eq(&self, other: &Self) -> bool {
        self.governor_text == other.governor_text && self.dependent_text == other.dependent_text
    }
}

impl Eq for Dependency {}

impl Hash for Dependency {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.governor_text.hash(state);
        self.dependent_text.hash(state);
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} --> {}", self.governor_text, self.dependent_text)
    }
}

fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}
