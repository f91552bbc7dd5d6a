//! Basic category extraction
//!
//! Treebank labels carry annotations after the category proper:
//! functional tags (`NP-SBJ`), coindexes (`NP-1`), gap indexes (`NP=2`).
//! The head finder and the normalizer compare *basic* categories only.

/// Category of a null or empty root label after normalization
pub const ROOT_CATEGORY: &str = "ROOT";

/// Label of empty elements and traces
pub const EMPTY_CATEGORY: &str = "-NONE-";

/// Switchboard disfluency markers, always spliced out by normalization
pub const EDITED_CATEGORY: &str = "EDITED";
pub const CODE_CATEGORY: &str = "CODE";

/// Maps a raw label to its basic category
///
/// Implementations must be pure and total over any input string.
pub trait CategoryNormalizer: Send + Sync {
    fn basic_category(&self, label: &str) -> String;
}

impl<F> CategoryNormalizer for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn basic_category(&self, label: &str) -> String {
        self(label)
    }
}

/// Penn Treebank conventions for annotation-introducing characters
#[derive(Debug, Clone)]
pub struct PennCategories {
    annotation_chars: Vec<char>,
}

impl PennCategories {
    pub fn new() -> Self {
        Self::with_annotation_chars(&['-', '=', '|', '#', '^', '~', '_'])
    }

    pub fn with_annotation_chars(chars: &[char]) -> Self {
        Self {
            annotation_chars: chars.to_vec(),
        }
    }

    /// Byte offset where the annotations of `category` begin
    ///
    /// An annotation character in first position opens a quoted span that
    /// the same character closes, so `-NONE-` and `-LRB-` stay whole.
    pub fn post_basic_category_index(&self, category: &str) -> usize {
        let mut opened: Option<char> = None;
        for (i, ch) in category.char_indices() {
            if !self.annotation_chars.contains(&ch) {
                continue;
            }
            if i == 0 {
                opened = Some(ch);
            } else if opened == Some(ch) {
                opened = None;
            } else {
                return i;
            }
        }
        category.len()
    }
}

impl Default for PennCategories {
    fn default() -> Self {
        Self::new()
    }
}

impl CategoryNormalizer for PennCategories {
    fn basic_category(&self, label: &str) -> String {
        label[..self.post_basic_category_index(label)].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_functional_tags() {
        let penn = PennCategories::new();
        assert_eq!(penn.basic_category("NP-SBJ-1"), "NP");
        assert_eq!(penn.basic_category("PP-LOC"), "PP");
        assert_eq!(penn.basic_category("NP=2"), "NP");
        assert_eq!(penn.basic_category("S|VP"), "S");
        assert_eq!(penn.basic_category("VP"), "VP");
    }

    #[test]
    fn test_keeps_quoted_categories() {
        let penn = PennCategories::new();
        assert_eq!(penn.basic_category("-NONE-"), "-NONE-");
        assert_eq!(penn.basic_category("-LRB-"), "-LRB-");
        assert_eq!(penn.basic_category("-NONE--1"), "-NONE-");
        assert_eq!(penn.basic_category(""), "");
    }

    #[test]
    fn test_basic_category_is_stable() {
        let penn = PennCategories::new();
        for label in ["NP-SBJ", "-NONE-", "-A-B", "=X", "-", "ADVP|PRT", "@VP"] {
            let once = penn.basic_category(label);
            assert_eq!(penn.basic_category(&once), once, "label {label}");
        }
    }

    #[test]
    fn test_custom_annotation_chars() {
        let only_dash = PennCategories::with_annotation_chars(&['-']);
        assert_eq!(only_dash.basic_category("NP=2"), "NP=2");
        assert_eq!(only_dash.basic_category("NP-2"), "NP");
    }

    #[test]
    fn test_closure_normalizer() {
        let upper = |label: &str| label.to_uppercase();
        assert_eq!(upper.basic_category("np"), "NP");
    }
}
