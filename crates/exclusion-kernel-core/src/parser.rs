use std::fmt::{Display, Formatter};

use serde::{Serialize, Serializer};

/// Characters allowed between entries of an actor's rule text. Any run of them
/// counts as one separator.
pub const DELIMITERS: [char; 4] = [' ', ',', '/', '\\'];

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum TokenError {
    #[error("rule token MUST be non-empty and not blank")]
    Empty,
    #[error("rule token MUST NOT contain delimiters: {0:?}")]
    ContainsDelimiter(String),
}

/// One unit of an actor's exclusion rules, compared case-insensitively.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct RuleToken {
    text: String,
    folded: String,
}

impl RuleToken {
    /// Build a token from text that contains no delimiters.
    ///
    /// # Errors
    /// Returns [`TokenError`] when `value` is empty or would split into
    /// several tokens.
    pub fn new(value: impl Into<String>) -> Result<Self, TokenError> {
        let text = value.into();
        if text.trim().is_empty() {
            return Err(TokenError::Empty);
        }
        if text.chars().any(is_delimiter) {
            return Err(TokenError::ContainsDelimiter(text));
        }
        Ok(Self::from_fragment(text))
    }

    fn from_fragment(text: String) -> Self {
        let folded = fold_case(&text);
        Self { text, folded }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Exact, case-insensitive equality with `term`. `Calendar2` does not
    /// match `Calendar`.
    #[must_use]
    pub fn matches(&self, term: &str) -> bool {
        eq_folded(&self.folded, term)
    }
}

impl Display for RuleToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

impl AsRef<str> for RuleToken {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

impl Serialize for RuleToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

fn is_delimiter(ch: char) -> bool {
    DELIMITERS.contains(&ch)
}

/// Case folding used for actor names and tokens. Folds per character so the
/// result agrees with [`RuleToken::matches`].
#[must_use]
pub fn fold_case(value: &str) -> String {
    value.chars().flat_map(char::to_lowercase).collect()
}

/// Compare an already folded string with an unfolded one without allocating.
pub(crate) fn eq_folded(folded: &str, other: &str) -> bool {
    folded.chars().eq(other.chars().flat_map(char::to_lowercase))
}

/// Split raw rule text into tokens, keeping order and case.
///
/// Only [`DELIMITERS`] separate tokens. Tabs and newlines stay inside the
/// fragment they appear in; fragments that are blank are dropped.
#[must_use]
pub fn parse(raw: &str) -> Vec<RuleToken> {
    raw.split(is_delimiter)
        .filter(|fragment| !fragment.trim().is_empty())
        .map(|fragment| RuleToken::from_fragment(fragment.to_string()))
        .collect()
}
