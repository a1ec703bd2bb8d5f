//! Packed `key=value:key2=value2:flag` string parsing.
//!
//! Grounded on `dir_lua.c`'s `arg_lookup` idiom: the runner control channel
//! and the admin channel both exchange commands as a single colon-separated
//! string of `key` or `key=value` tokens rather than a binary struct.

use std::collections::HashMap;

/// A parsed packed argument string. Preserves the original token order so a
/// caller can still ask "was `key` present at all" for flag-only tokens
/// (`begin_kv_transaction`, `end_kv_transaction`, `reload`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgStr {
    values: HashMap<String, String>,
    flags: Vec<String>,
}

impl ArgStr {
    /// Parses `text` as a colon-separated sequence of `key` or `key=value`
    /// tokens. Empty tokens (consecutive colons, leading/trailing colon) are
    /// skipped rather than treated as errors, matching the tolerant
    /// behaviour of the original tokenizer.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut values = HashMap::new();
        let mut flags = Vec::new();
        for token in text.split(':') {
            if token.is_empty() {
                continue;
            }
            match token.split_once('=') {
                Some((key, value)) => {
                    values.insert(key.to_string(), value.to_string());
                }
                None => flags.push(token.to_string()),
            }
        }
        Self { values, flags }
    }

    /// The value bound to `key`, if `key=value` was present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// True if `key` appeared as a bare flag token (no `=value`).
    #[must_use]
    pub fn has_flag(&self, key: &str) -> bool {
        self.flags.iter().any(|flag| flag == key)
    }

    /// True if `key` appeared at all, bound or as a bare flag.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key) || self.has_flag(key)
    }
}
