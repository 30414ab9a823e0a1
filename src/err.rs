//! Error interface for this crate.
//!
//! All of the fallible pieces of this crate (operand construction, program
//! building, simulation) define their own error enums. Beyond the standard
//! [`std::error::Error`] machinery, each of them implements this module's
//! [`Error`] trait, which can provide a help message describing how to
//! resolve the error.

use std::borrow::Cow;

/// Unified error interface for all errors in this crate.
pub trait Error: std::error::Error {
    /// A possible help message to help resolve this error.
    fn help(&self) -> Option<Cow<'_, str>> {
        None
    }
}

/// Formats an error into a printable report,
/// appending the error's help message if it has one.
///
/// ## Example
///
/// ```
/// use lc3_mini::ast::Imm5;
/// use lc3_mini::err;
///
/// let e = Imm5::new(31).unwrap_err();
/// let report = err::report(&e);
/// assert!(report.contains("help"));
/// ```
pub fn report<E: Error + ?Sized>(err: &E) -> String {
    match err.help() {
        Some(help) => format!("error: {err}\nhelp: {help}"),
        None       => format!("error: {err}"),
    }
}
