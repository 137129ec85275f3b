//! Identifier generation and validation.
//!
//! Identifiers are embedded directly in query text (never parameterized),
//! so they are validated against a strict grammar at construction time.
//! The [`IdentifierGenerator`] allocates collision-free names for anonymous
//! pattern elements; it is an explicit per-session value, never a global,
//! because concurrent sessions must not share allocation state.

use crate::error::{Error, Result};
use smol_str::SmolStr;
use std::collections::HashSet;

/// Allocates collision-free identifiers for one query-building session.
///
/// Two allocation modes are supported: purely sequential anonymous names
/// ([`next`](Self::next)) and label-derived deduplicated names
/// ([`unique`](Self::unique)). Names are never reused, even conceptually
/// "released" ones.
#[derive(Debug, Default)]
pub struct IdentifierGenerator {
    counter: u32,
    issued: HashSet<SmolStr>,
}

impl IdentifierGenerator {
    /// Creates a generator with no names issued.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a fresh sequential name, distinct from every name this
    /// generator has produced.
    ///
    /// The leading underscore keeps these out of the label-prefix namespace
    /// used by [`unique`](Self::unique), since labels themselves may not
    /// contain underscores.
    pub fn next(&mut self) -> SmolStr {
        self.counter += 1;
        SmolStr::new(format!("_i_{}", self.counter))
    }

    /// Returns a short name derived from `label`, deduplicated against every
    /// name this generator has issued.
    ///
    /// The label is lower-cased and prefixes of increasing length are tried
    /// first; once every prefix (including the full label) is taken, numeric
    /// suffixes `1, 2, 3, …` are appended until an unused candidate is
    /// found. The search space is unbounded, so there is no error path.
    /// Labels are arbitrary text here; prefixes grow one character at a
    /// time, so multi-byte characters are never split.
    pub fn unique(&mut self, label: &str) -> SmolStr {
        let lowered = label.to_lowercase();

        for (offset, ch) in lowered.char_indices() {
            let candidate = SmolStr::new(&lowered[..offset + ch.len_utf8()]);
            if !self.issued.contains(&candidate) {
                self.issued.insert(candidate.clone());
                return candidate;
            }
        }

        let mut suffix = 1u64;
        loop {
            let candidate = SmolStr::new(format!("{lowered}{suffix}"));
            if !self.issued.contains(&candidate) {
                self.issued.insert(candidate.clone());
                return candidate;
            }
            suffix += 1;
        }
    }
}

/// Validates an identifier against the strict identifier grammar: one or
/// more ASCII letters or digits.
///
/// Applies to node/relationship/alias names and labels, all of which appear
/// verbatim in generated query text.
pub fn validate_identifier(text: &str) -> Result<()> {
    if !text.is_empty() && text.bytes().all(|b| b.is_ascii_alphanumeric()) {
        Ok(())
    } else {
        Err(Error::InvalidIdentifier {
            text: text.to_string(),
        })
    }
}

/// Validates a property name: a leading ASCII letter followed by ASCII
/// letters, digits, or underscores.
pub fn validate_property_name(text: &str) -> Result<()> {
    let mut bytes = text.bytes();
    let valid = match bytes.next() {
        Some(first) => {
            first.is_ascii_alphabetic()
                && bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_')
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(Error::InvalidPropertyName {
            text: text.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_is_monotonic_and_distinct() {
        let mut generator = IdentifierGenerator::new();
        assert_eq!(generator.next(), "_i_1");
        assert_eq!(generator.next(), "_i_2");
        assert_eq!(generator.next(), "_i_3");
    }

    #[test]
    fn unique_tries_increasing_prefixes() {
        let mut generator = IdentifierGenerator::new();
        assert_eq!(generator.unique("user"), "u");
        assert_eq!(generator.unique("user"), "us");
        assert_eq!(generator.unique("user"), "use");
        assert_eq!(generator.unique("user"), "user");
    }

    #[test]
    fn unique_falls_back_to_numeric_suffixes() {
        let mut generator = IdentifierGenerator::new();
        for _ in 0..4 {
            generator.unique("user");
        }
        // All prefixes of "user" are exhausted at this point.
        assert_eq!(generator.unique("user"), "user1");
        assert_eq!(generator.unique("user"), "user2");
    }

    #[test]
    fn unique_lowercases_labels() {
        let mut generator = IdentifierGenerator::new();
        assert_eq!(generator.unique("Person"), "p");
        assert_eq!(generator.unique("PERSON"), "pe");
    }

    #[test]
    fn unique_walks_multibyte_labels_by_character() {
        let mut generator = IdentifierGenerator::new();
        assert_eq!(generator.unique("Café"), "c");
        assert_eq!(generator.unique("Café"), "ca");
        assert_eq!(generator.unique("Café"), "caf");
        assert_eq!(generator.unique("Café"), "café");
        assert_eq!(generator.unique("Café"), "café1");
    }

    #[test]
    fn unique_across_different_labels_shares_the_pool() {
        let mut generator = IdentifierGenerator::new();
        assert_eq!(generator.unique("person"), "p");
        // "p" is taken by the previous call, so "post" starts at "po".
        assert_eq!(generator.unique("post"), "po");
    }

    #[test]
    fn identifier_grammar_accepts_alphanumerics_only() {
        assert!(validate_identifier("p").is_ok());
        assert!(validate_identifier("node42").is_ok());
        assert!(validate_identifier("N1").is_ok());

        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("my-node").is_err());
        assert!(validate_identifier("a b").is_err());
        assert!(validate_identifier("naïve").is_err());
        assert!(validate_identifier("_v0").is_err());
    }

    #[test]
    fn property_grammar_requires_leading_letter() {
        assert!(validate_property_name("name").is_ok());
        assert!(validate_property_name("created_at").is_ok());
        assert!(validate_property_name("x1").is_ok());

        assert!(validate_property_name("").is_err());
        assert!(validate_property_name("1name").is_err());
        assert!(validate_property_name("_hidden").is_err());
        assert!(validate_property_name("has space").is_err());
    }
}
