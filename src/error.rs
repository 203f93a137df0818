//! Rich diagnostic error types for the heka engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text so users know exactly what went wrong and
//! how to fix it.
//!
//! Note that unification failure, empty query results, and exhausted depth or
//! step budgets are *not* errors — they are ordinary `None`/empty outcomes.
//! Errors here mean the caller handed the engine something malformed or the
//! engine itself is misconfigured.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the heka engine.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum HekaError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Atom(#[from] AtomError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Space(#[from] SpaceError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Atom errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum AtomError {
    #[error("expression with relation '{tag}' has no children")]
    #[diagnostic(
        code(heka::atom::empty_expression),
        help(
            "An expression must have at least one child atom. \
             If you meant a bare relation, intern it as a Symbol instead."
        )
    )]
    EmptyExpression { tag: String },

    #[error("blank name for {what}")]
    #[diagnostic(
        code(heka::atom::blank_name),
        help("Symbol names, variable names, and relation tags must be non-empty.")
    )]
    BlankName { what: &'static str },

    #[error("variable name '{name}' does not start with '$'")]
    #[diagnostic(
        code(heka::atom::bad_variable),
        help(
            "Variable names use the '$' sigil (e.g. `$x`), which keeps them \
             distinguishable from symbols in printed identities."
        )
    )]
    BadVariableName { name: String },

    #[error("symbol name '{name}' uses the reserved '$' sigil")]
    #[diagnostic(
        code(heka::atom::reserved_sigil),
        help("Names starting with '$' denote variables. Use Atom::variable instead.")
    )]
    ReservedSigil { name: String },

    #[error("grounded atom has a blank identity token")]
    #[diagnostic(
        code(heka::atom::blank_grounded_token),
        help(
            "Grounded atoms are compared by their identity token, never by deep \
             value comparison. Provide a stable, non-empty token."
        )
    )]
    BlankGroundedToken,
}

// ---------------------------------------------------------------------------
// Space errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SpaceError {
    #[error("atom not tracked: {id}")]
    #[diagnostic(
        code(heka::space::untracked),
        help(
            "The atom id is not present in this space. It was either never \
             interned here or has been evicted by a maintenance sweep."
        )
    )]
    Untracked { id: String },

    #[error("clock went backwards: now={now}, last access stamp={last}")]
    #[diagnostic(
        code(heka::space::clock_regression),
        help(
            "The logical clock must be monotonically non-decreasing. \
             Use a single shared LogicalClock instance and only advance it."
        )
    )]
    ClockRegression { now: u64, last: u64 },
}

// ---------------------------------------------------------------------------
// Chaining errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ChainError {
    #[error("malformed rule expression {id}: {reason}")]
    #[diagnostic(
        code(heka::chain::malformed_rule),
        help(
            "Planner rules have the shape `(Rule (And pre..) action effect)`. \
             Check the arity and the `And` wrapper around the preconditions."
        )
    )]
    MalformedRule { id: String, reason: String },
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config file: {source}")]
    #[diagnostic(
        code(heka::config::io),
        help("Check that the config path exists and is readable.")
    )]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {message}")]
    #[diagnostic(
        code(heka::config::parse),
        help("The config must be valid TOML matching the SpaceConfig fields.")
    )]
    Parse { message: String },

    #[error("invalid config value for `{field}`: {message}")]
    #[diagnostic(
        code(heka::config::invalid_value),
        help("See the SpaceConfig documentation for the valid range of each field.")
    )]
    InvalidValue {
        field: &'static str,
        message: String,
    },
}

/// Convenience alias for functions returning heka results.
pub type HekaResult<T> = std::result::Result<T, HekaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atom_error_converts_to_heka_error() {
        let err = AtomError::EmptyExpression {
            tag: "Inheritance".into(),
        };
        let heka: HekaError = err.into();
        assert!(matches!(heka, HekaError::Atom(AtomError::EmptyExpression { .. })));
    }

    #[test]
    fn space_error_converts_to_heka_error() {
        let err = SpaceError::Untracked { id: "Cat".into() };
        let heka: HekaError = err.into();
        assert!(matches!(heka, HekaError::Space(SpaceError::Untracked { .. })));
    }

    #[test]
    fn error_display_messages_are_descriptive() {
        let err = ConfigError::InvalidValue {
            field: "high_water",
            message: "must be greater than zero".into(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("high_water"));
        assert!(msg.contains("greater than zero"));
    }
}
