//! User-visible feedback for API failures
//!
//! Every recognized [`ErrorCode`] turns into exactly one toast. A few codes
//! also end the session or move the user off the current view.

use crate::error::{ApiError, ErrorCode};

/// Severity of a toast
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Warning,
    Error,
}

/// The UI seam for error feedback
pub trait Notifier: Send + Sync {
    /// Show a short message
    fn toast(&self, level: ToastLevel, message: &str);

    /// Drop the current session
    fn force_logout(&self);

    /// Leave the view the user is no longer allowed to see
    fn navigate_away(&self);
}

/// Whether [`handle_api_error`] dealt with the error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handling {
    Handled(ErrorCode),
    Unhandled,
}

#[cfg(test)]
impl Handling {
    pub fn is_handled(&self) -> bool {
        matches!(self, Handling::Handled(_))
    }
}

/// Toast level for a recognized code
fn level_for(code: ErrorCode) -> ToastLevel {
    match code {
        ErrorCode::Ratelimited | ErrorCode::MissingFields | ErrorCode::InvalidPassword => {
            ToastLevel::Warning
        }
        _ => ToastLevel::Error,
    }
}

/// Show the notification for `err` and apply its side effects.
///
/// Errors without a recognized code are logged and left to the caller.
pub fn handle_api_error(err: &ApiError, notifier: &dyn Notifier) -> Handling {
    let Some(code) = err.code() else {
        log::error!("Unhandled API error: {}", err);
        return Handling::Unhandled;
    };

    let message = match err {
        // Only reached when the retry itself was challenged again
        ApiError::ChallengeRequired(_) => "Second-factor verification failed.".to_string(),
        other => other.to_string(),
    };
    notifier.toast(level_for(code), &message);

    match code {
        ErrorCode::Banned | ErrorCode::InvalidSession => notifier.force_logout(),
        ErrorCode::InsufficientPermissions => notifier.navigate_away(),
        _ => {}
    }

    log::debug!("Handled API error {}", code.as_str());
    Handling::Handled(code)
}

/// Notifier that records everything it is asked to do
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub toasts: std::sync::Mutex<Vec<(ToastLevel, String)>>,
    pub logouts: std::sync::atomic::AtomicUsize,
    pub navigations: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl RecordingNotifier {
    pub fn toast_count(&self) -> usize {
        self.toasts.lock().unwrap().len()
    }

    pub fn logout_count(&self) -> usize {
        self.logouts.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn navigation_count(&self) -> usize {
        self.navigations.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl Notifier for RecordingNotifier {
    fn toast(&self, level: ToastLevel, message: &str) {
        self.toasts.lock().unwrap().push((level, message.to_string()));
    }

    fn force_logout(&self) {
        self.logouts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }

    fn navigate_away(&self) {
        self.navigations
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_banned_toasts_and_logs_out() {
        let notifier = RecordingNotifier::default();
        let handling = handle_api_error(&ApiError::Banned, &notifier);

        assert_eq!(handling, Handling::Handled(ErrorCode::Banned));
        assert_eq!(notifier.toast_count(), 1);
        assert_eq!(notifier.logout_count(), 1);
        assert_eq!(notifier.navigation_count(), 0);
    }

    #[test]
    fn test_invalid_session_logs_out() {
        let notifier = RecordingNotifier::default();
        handle_api_error(&ApiError::InvalidSession, &notifier);
        assert_eq!(notifier.logout_count(), 1);
    }

    #[test]
    fn test_insufficient_permissions_navigates_away() {
        let notifier = RecordingNotifier::default();
        let handling = handle_api_error(&ApiError::InsufficientPermissions, &notifier);

        assert!(handling.is_handled());
        assert_eq!(notifier.toast_count(), 1);
        assert_eq!(notifier.navigation_count(), 1);
        assert_eq!(notifier.logout_count(), 0);
    }

    #[test]
    fn test_plain_codes_only_toast() {
        for err in [
            ApiError::Ratelimited(Duration::from_secs(3)),
            ApiError::Internal("db".into()),
            ApiError::Generic("nope".into()),
            ApiError::MissingFields("name".into()),
            ApiError::InvalidPassword,
        ] {
            let notifier = RecordingNotifier::default();
            assert!(handle_api_error(&err, &notifier).is_handled());
            assert_eq!(notifier.toast_count(), 1);
            assert_eq!(notifier.logout_count(), 0);
            assert_eq!(notifier.navigation_count(), 0);
        }
    }

    #[test]
    fn test_invalid_password_is_a_warning() {
        let notifier = RecordingNotifier::default();
        handle_api_error(&ApiError::InvalidPassword, &notifier);
        let toasts = notifier.toasts.lock().unwrap();
        assert_eq!(toasts[0].0, ToastLevel::Warning);
        assert!(toasts[0].1.contains("password"));
    }

    #[test]
    fn test_unrecognized_errors_are_unhandled() {
        let notifier = RecordingNotifier::default();
        let unknown = ApiError::Unrecognized {
            code: "TEAPOT_ERROR".into(),
            message: "short and stout".into(),
        };

        assert_eq!(handle_api_error(&unknown, &notifier), Handling::Unhandled);
        assert_eq!(
            handle_api_error(&ApiError::Network("down".into()), &notifier),
            Handling::Unhandled
        );
        assert_eq!(notifier.toast_count(), 0);
    }
}
