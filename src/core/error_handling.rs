//! Generic error handling utilities
//!
//! Every subsystem error implements `ContextualError` so the binary can report
//! failures uniformly: operator mistakes get their specific message, engine and
//! internal faults get a generic context line with details at debug level.

/// Trait for errors that can distinguish between user-actionable and system errors
///
/// When `is_user_actionable()` returns `true`, `user_message()` must return
/// `Some(message)`; otherwise it returns `None`.
pub trait ContextualError: std::error::Error {
    /// True for errors the operator can fix directly, such as a malformed
    /// target URL, an unknown profile or missing authorization
    fn is_user_actionable(&self) -> bool;

    /// The specific message for user-actionable errors
    fn user_message(&self) -> Option<&str>;
}

/// Log errors with appropriate detail level based on error specificity
///
/// # Examples
/// ```rust,no_run
/// # use websecscan::core::error_handling::log_error_with_context;
/// # use websecscan::session::SessionError;
/// let err = SessionError::AuthorizationRequired {
///     profile_id: "active".to_string(),
///     reason: "Confirm you are authorized to test the target".to_string(),
/// };
/// log_error_with_context(&err, "Starting scan session");
/// ```
pub fn log_error_with_context<E: ContextualError + std::fmt::Display + std::fmt::Debug>(
    error: &E,
    operation_context: &str,
) {
    match error.user_message() {
        Some(user_msg) if error.is_user_actionable() => log::error!("FATAL: {}", user_msg),
        _ => log::error!("FATAL: {}: {}", operation_context, error),
    }
    log::debug!("DEBUG_DETAILS: {:?}", error);
}
