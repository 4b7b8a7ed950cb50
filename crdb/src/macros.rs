//! Shorthands for building and returning [`crate::error::CrdbError`]s.

/// Creates a [`crate::error::CrdbError`] from a kind, a static description and
/// an optional detail.
#[macro_export]
macro_rules! crdb_error {
    ($kind:expr, $desc:expr) => {
        $crate::error::CrdbError::from(($kind, $desc))
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        $crate::error::CrdbError::from(($kind, $desc, $detail.to_string()))
    };
}

/// Returns early with a [`crate::error::CrdbError`].
#[macro_export]
macro_rules! bail {
    ($kind:expr, $desc:expr) => {
        return Err($crate::crdb_error!($kind, $desc))
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        return Err($crate::crdb_error!($kind, $desc, $detail))
    };
}
