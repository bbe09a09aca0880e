//! Combinators layered on `std::result::Result`.
//!
//! The pipeline composes every stage through `Result`. The standard type
//! already covers most of what is needed:
//!
//! | operation | std form |
//! |-----------|----------|
//! | map       | [`Result::map`] |
//! | flat map  | [`Result::and_then`] |
//! | or else   | [`Result::unwrap_or`] / [`Result::unwrap_or_else`] |
//! | expect    | `?` at the orchestrator boundary |
//!
//! [`ResultExt`] adds the two operations std has no exact form for:
//! a fallible `map` and a `recover` that keeps the original cause when the
//! handler itself fails.

/// Extra combinators for `Result<T, E>`.
pub trait ResultExt<T, E> {
    /// Map the success value with a fallible function.
    ///
    /// A failure returned by `f` becomes the failure of the chain.
    fn try_map<U, E2, F>(self, f: F) -> Result<U, E>
    where
        F: FnOnce(T) -> Result<U, E2>,
        E: From<E2>;

    /// Try to turn a failure back into a success.
    ///
    /// If `handler` fails too, the original failure is kept.
    fn recover<E2, F>(self, handler: F) -> Result<T, E>
    where
        F: FnOnce(&E) -> Result<T, E2>;
}

impl<T, E> ResultExt<T, E> for Result<T, E> {
    fn try_map<U, E2, F>(self, f: F) -> Result<U, E>
    where
        F: FnOnce(T) -> Result<U, E2>,
        E: From<E2>,
    {
        match self {
            Ok(value) => f(value).map_err(E::from),
            Err(cause) => Err(cause),
        }
    }

    fn recover<E2, F>(self, handler: F) -> Result<T, E>
    where
        F: FnOnce(&E) -> Result<T, E2>,
    {
        match self {
            Ok(value) => Ok(value),
            Err(cause) => match handler(&cause) {
                Ok(value) => Ok(value),
                Err(_) => Err(cause),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Cause(&'static str);

    impl From<std::num::ParseIntError> for Cause {
        fn from(_: std::num::ParseIntError) -> Self {
            Cause("not a number")
        }
    }

    #[test]
    fn test_try_map_success_and_failure() {
        let ok: Result<&str, Cause> = Ok("42");
        assert_eq!(ok.try_map(|s| s.parse::<u32>()), Ok(42));

        let bad: Result<&str, Cause> = Ok("forty-two");
        assert_eq!(bad.try_map(|s| s.parse::<u32>()), Err(Cause("not a number")));
    }

    #[test]
    fn test_failure_short_circuits() {
        let failed: Result<&str, Cause> = Err(Cause("first"));
        let mut called = false;
        let out = failed.try_map(|s| {
            called = true;
            s.parse::<u32>()
        });
        assert!(!called);
        assert_eq!(out, Err(Cause("first")));

        let failed: Result<u32, Cause> = Err(Cause("first"));
        assert_eq!(failed.map(|n| n + 1).and_then(|n| Ok::<_, Cause>(n * 2)), Err(Cause("first")));
    }

    #[test]
    fn test_or_else_receives_cause() {
        let failed: Result<String, Cause> = Err(Cause("gone"));
        assert_eq!(failed.unwrap_or_else(|c| c.0.to_string()), "gone");

        let recovered: Result<u32, Cause> = Err(Cause("missing"));
        assert_eq!(recovered.recover(|_| Ok::<_, ()>(3)).unwrap_or(0), 3);
    }

    #[test]
    fn test_recover_restores_success() {
        let failed: Result<u32, Cause> = Err(Cause("missing"));
        assert_eq!(failed.recover(|_| Ok::<_, ()>(7)), Ok(7));
    }

    #[test]
    fn test_recover_keeps_original_cause() {
        let failed: Result<u32, Cause> = Err(Cause("original"));
        let out = failed.recover(|_| Err::<u32, _>(Cause("handler")));
        assert_eq!(out, Err(Cause("original")));
    }

    #[test]
    fn test_recover_passes_success_through() {
        let ok: Result<u32, Cause> = Ok(1);
        assert_eq!(ok.recover(|_| Ok::<_, ()>(2)), Ok(1));
    }
}
