//! Explicit outcome of a single batch item

use crate::{Error, Result};

/// What a batch should do after processing one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Item processed, carry on
    Continue,
    /// Item dropped, carry on with the next one
    Skip(Error),
    /// Stop the batch
    Abort,
    /// Error that ends the batch and propagates to the caller
    Fatal(Error),
}

impl Outcome {
    /// Classify the result of processing one item
    pub fn from_result(result: Result<()>) -> Self {
        match result {
            Ok(()) => Self::Continue,
            Err(error) if error.is_skip() => Self::Skip(error),
            Err(error) if error.is_abort() => Self::Abort,
            Err(error) => Self::Fatal(error),
        }
    }

    /// Whether the item completed successfully
    pub fn is_continue(&self) -> bool {
        matches!(self, Self::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Ok(()), Outcome::Continue)]
    #[case(Err(Error::skip("busy")), Outcome::Skip(Error::skip("busy")))]
    #[case(Err(Error::Abort), Outcome::Abort)]
    #[case(Err(Error::CallbackGuardAbort), Outcome::Abort)]
    #[case(Err(Error::command("denied")), Outcome::Fatal(Error::command("denied")))]
    fn test_outcome_classification(#[case] result: Result<()>, #[case] expected: Outcome) {
        assert_eq!(Outcome::from_result(result), expected);
    }
}
