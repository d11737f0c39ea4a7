use regex::{Regex, RegexBuilder};

use crate::{errors::Error, Result};

/// Replacement for every denied word.
pub const MASK: &str = "****";

const DEFAULT_DENYLIST: &[&str] = &[
    "arse", "arsehole", "ass", "asshole", "bastard", "bitch", "bollocks", "bullshit", "crap",
    "cunt", "damn", "dick", "dickhead", "fuck", "fucker", "motherfucker", "piss", "prick",
    "shit", "slut", "twat", "wanker", "whore",
];

/// Denylist-based profanity filter.
///
/// Whole words (plus a few common inflections) are masked case-insensitively.
#[derive(Clone, Debug)]
pub struct Censor {
    pattern: Option<Regex>,
}

impl Censor {
    /// Built-in denylist extended with `extra_words`.
    pub fn new(extra_words: &[String]) -> Result<Self> {
        let words = DEFAULT_DENYLIST
            .iter()
            .map(|w| w.to_string())
            .chain(extra_words.iter().cloned());
        Self::from_words(words)
    }

    /// Censor that never changes its input.
    pub fn disabled() -> Self {
        Self { pattern: None }
    }

    pub fn from_words(words: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut words: Vec<String> = words
            .into_iter()
            .map(|w| w.trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        if words.is_empty() {
            return Ok(Self::disabled());
        }
        // Longest first so alternation prefers "fucker" over "fuck".
        words.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        words.dedup();

        let alternation = words
            .iter()
            .map(|w| regex::escape(w))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = RegexBuilder::new(&format!(r"\b(?:{alternation})(?:s|es|ed|ing|er|ers)?\b"))
            .case_insensitive(true)
            .build()
            .map_err(|e| Error::Config(format!("invalid censor word list: {e}")))?;

        Ok(Self {
            pattern: Some(pattern),
        })
    }

    pub fn censor(&self, text: &str) -> String {
        match &self.pattern {
            Some(re) => re.replace_all(text, MASK).into_owned(),
            None => text.to_string(),
        }
    }
}
