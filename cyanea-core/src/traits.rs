//! Small shared traits implemented by result and model types across crates.

/// A result that reduces to one number: a similarity, a correlation
/// coefficient. Undefined results report `f64::NAN`.
pub trait Scored {
    fn score(&self) -> f64;
}

/// A named entity such as an ontology term.
pub trait Annotated {
    /// Stable identifier or display name.
    fn name(&self) -> &str;

    fn description(&self) -> Option<&str> {
        None
    }
}

/// One-line, human-readable description for logs.
pub trait Summarizable {
    fn summary(&self) -> String;
}
