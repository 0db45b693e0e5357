use std::{
    error::Error,
    fmt::{self, Display},
};

/// The result type used in the entire optimization crate.
pub type Result<T> = std::result::Result<T, OptimErr>;

/// The optimization crate's error type.
///
/// Every variant is a contract violation by the caller, none of them are transient.
#[derive(Debug, Clone, PartialEq)]
pub enum OptimErr {
    /// A call argument is invalid for the requested operation.
    InvalidArgument(&'static str),

    /// A length invariant between weights, gradients or per-key buffers was violated.
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },

    /// An optimizer specification holds values the builder can't accept.
    InvalidConfig(String),
}

impl OptimErr {
    /// Checks that two lengths agree.
    ///
    /// # Arguments
    /// * `what` - Human readable name of the checked buffer.
    /// * `got` - The observed length.
    /// * `expected` - The length it should have.
    ///
    /// # Returns
    /// A `SizeMismatch` error if the lengths differ.
    pub(crate) fn check_len(what: &'static str, got: usize, expected: usize) -> Result<()> {
        if got != expected {
            return Err(Self::SizeMismatch {
                what,
                got,
                expected,
            });
        }

        Ok(())
    }
}

impl Display for OptimErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimErr::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            OptimErr::SizeMismatch {
                what,
                got,
                expected,
            } => write!(f, "size mismatch for {what}: got {got}, expected {expected}"),
            OptimErr::InvalidConfig(msg) => write!(f, "invalid optimizer config: {msg}"),
        }
    }
}

impl Error for OptimErr {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_len() {
        assert!(OptimErr::check_len("gradient", 3, 3).is_ok());

        let err = OptimErr::check_len("gradient", 2, 3).unwrap_err();
        assert_eq!(
            err,
            OptimErr::SizeMismatch {
                what: "gradient",
                got: 2,
                expected: 3
            }
        );
        assert_eq!(err.to_string(), "size mismatch for gradient: got 2, expected 3");
    }
}
