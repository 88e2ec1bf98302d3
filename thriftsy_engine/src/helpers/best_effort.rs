use std::fmt::Display;

use log::warn;

/// Runs the outcome of a secondary write (ledger rows, audit entries) through a single, explicit policy: failures are
/// logged and swallowed so that they never change the outcome of the primary operation.
///
/// Returns the value on success.
pub fn best_effort<T, E: Display>(what: &str, result: Result<T, E>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("⚠️ Best-effort side effect '{what}' failed and was skipped: {e}");
            None
        },
    }
}
