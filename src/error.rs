//! Error model for query construction and rendering.
//!
//! Every failure in this crate is synchronous, local, and fatal to the
//! current build: rendering is pure and deterministic, so a retry would
//! reproduce the same failure. Errors divide into construction-time
//! rejections (bad identifiers, empty property sets) and rendering-time
//! rejections (build-once violations, cyclical paths, empty clauses).

use miette::{Diagnostic, Severity};
use std::fmt;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// A query construction or rendering failure.
///
/// Each variant names the invariant it guards and carries the offending
/// value where one is available. Variants map one-to-one onto stable
/// diagnostic codes (see [`Diagnostic::code`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// An identifier (node/relationship/alias name or label) failed the
    /// identifier grammar: ASCII letters and digits, at least one character.
    InvalidIdentifier {
        /// The rejected text.
        text: String,
    },

    /// A property name failed the property grammar: a leading ASCII letter
    /// followed by ASCII letters, digits, or underscores.
    InvalidPropertyName {
        /// The rejected text.
        text: String,
    },

    /// A relationship property was given a null value.
    NullPropertyValue {
        /// The property that was assigned null.
        property: String,
    },

    /// A fragment was rendered in a position that requires an identifier,
    /// but none was ever assigned.
    MissingIdentifier {
        /// Description of the offending fragment.
        fragment: String,
    },

    /// A node or relationship was referenced before it was rendered as a
    /// full definition anywhere in the current build.
    UsedBeforeDefined {
        /// Description of the offending fragment.
        fragment: String,
    },

    /// A relationship was rendered as a full definition a second time
    /// within one build.
    BuiltTwice {
        /// Description of the offending fragment.
        fragment: String,
    },

    /// A path revisited a node instance while walking start to end.
    CyclicalReference,

    /// A RETURN clause or WITH projection was requested with zero targets.
    EmptyReturn,

    /// A WHERE phrase was rendered with zero conditions.
    EmptyWhere,

    /// A junction, UNWIND, DELETE, or similar composite was constructed
    /// with zero operands.
    EmptyConditions,

    /// A SET phrase or upsert property map was constructed empty where at
    /// least one property is required.
    EmptyProperties,

    /// A CASE expression was constructed with zero WHEN/THEN arms.
    EmptyCase,

    /// A date range was constructed with neither an after nor a before bound.
    EmptyDateRange,

    /// An upsert or key-only merge needs an identifying property, but the
    /// node has none configured or its value is absent.
    MissingIdentifyingProperty {
        /// Description of the offending node.
        node: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidIdentifier { text } => {
                write!(f, "invalid identifier `{text}`")
            }
            Error::InvalidPropertyName { text } => {
                write!(f, "invalid property name `{text}`")
            }
            Error::NullPropertyValue { property } => {
                write!(f, "relationship property `{property}` cannot be null")
            }
            Error::MissingIdentifier { fragment } => {
                write!(f, "{fragment} has no identifier but one is required here")
            }
            Error::UsedBeforeDefined { fragment } => {
                write!(f, "{fragment} cannot be used as it has not been built yet")
            }
            Error::BuiltTwice { fragment } => {
                write!(f, "{fragment} cannot be built twice")
            }
            Error::CyclicalReference => {
                write!(f, "cyclical reference detected, unable to build path")
            }
            Error::EmptyReturn => {
                write!(f, "at least one return value must be specified")
            }
            Error::EmptyWhere => {
                write!(f, "no conditions have been added to this WHERE clause")
            }
            Error::EmptyConditions => {
                write!(f, "at least one operand is required")
            }
            Error::EmptyProperties => {
                write!(f, "at least one property is required")
            }
            Error::EmptyCase => {
                write!(f, "a CASE expression requires at least one WHEN/THEN arm")
            }
            Error::EmptyDateRange => {
                write!(f, "a date range requires at least one bound")
            }
            Error::MissingIdentifyingProperty { node } => {
                write!(f, "{node} has no identifying property value to merge on")
            }
        }
    }
}

impl std::error::Error for Error {}

impl Diagnostic for Error {
    fn severity(&self) -> Option<Severity> {
        Some(Severity::Error)
    }

    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let code = match self {
            Error::InvalidIdentifier { .. } => "cypher::invalid_identifier",
            Error::InvalidPropertyName { .. } => "cypher::invalid_property_name",
            Error::NullPropertyValue { .. } => "cypher::null_property_value",
            Error::MissingIdentifier { .. } => "cypher::missing_identifier",
            Error::UsedBeforeDefined { .. } => "cypher::used_before_defined",
            Error::BuiltTwice { .. } => "cypher::built_twice",
            Error::CyclicalReference => "cypher::cyclical_reference",
            Error::EmptyReturn => "cypher::empty_return",
            Error::EmptyWhere => "cypher::empty_where",
            Error::EmptyConditions => "cypher::empty_conditions",
            Error::EmptyProperties => "cypher::empty_properties",
            Error::EmptyCase => "cypher::empty_case",
            Error::EmptyDateRange => "cypher::empty_date_range",
            Error::MissingIdentifyingProperty { .. } => "cypher::missing_identifying_property",
        };
        Some(Box::new(code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let help = match self {
            Error::InvalidIdentifier { .. } => {
                "identifiers may contain only ASCII letters and digits and must not be empty"
            }
            Error::InvalidPropertyName { .. } => {
                "property names must start with an ASCII letter and may contain letters, digits, and underscores"
            }
            Error::UsedBeforeDefined { .. } => {
                "define the pattern in a MATCH or MERGE before referencing it"
            }
            Error::BuiltTwice { .. } => {
                "reference an already-built relationship by its identifier instead of redefining it"
            }
            Error::CyclicalReference => {
                "each node may appear at most once along a single path"
            }
            Error::MissingIdentifyingProperty { .. } => {
                "set an identifying property with a non-null value before merging by key"
            }
            _ => return None,
        };
        Some(Box::new(help))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_offending_value() {
        let err = Error::InvalidIdentifier {
            text: "my-node".to_string(),
        };
        assert_eq!(err.to_string(), "invalid identifier `my-node`");

        let err = Error::UsedBeforeDefined {
            fragment: "node `p`".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "node `p` cannot be used as it has not been built yet"
        );
    }

    #[test]
    fn all_errors_are_error_severity() {
        assert_eq!(Error::CyclicalReference.severity(), Some(Severity::Error));
        assert_eq!(Error::EmptyReturn.severity(), Some(Severity::Error));
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(
            Error::CyclicalReference.code().unwrap().to_string(),
            "cypher::cyclical_reference"
        );
        assert_eq!(
            Error::EmptyWhere.code().unwrap().to_string(),
            "cypher::empty_where"
        );
    }

    #[test]
    fn help_present_for_pattern_errors() {
        let err = Error::BuiltTwice {
            fragment: "relationship `k`".to_string(),
        };
        assert!(err.help().is_some());
        assert!(Error::EmptyReturn.help().is_none());
    }
}
