//! Terminal rendition of user feedback

use colored::Colorize;

use crate::config::Config;
use crate::feedback::{Notifier, ToastLevel};

/// Prints toasts to stderr and applies session side effects to the config
pub struct TerminalNotifier {
    config_path: Option<String>,
}

impl TerminalNotifier {
    pub fn new(config_path: Option<&str>) -> Self {
        Self {
            config_path: config_path.map(str::to_string),
        }
    }
}

impl Notifier for TerminalNotifier {
    fn toast(&self, level: ToastLevel, message: &str) {
        let line = match level {
            ToastLevel::Warning => format!("{} {}", "⚠".yellow(), message.yellow()),
            ToastLevel::Error => format!("{} {}", "✗".red(), message.red()),
        };
        eprintln!("{}", line);
    }

    fn force_logout(&self) {
        match Config::update_at(self.config_path.as_deref(), |config| config.session = None) {
            Ok(_) => eprintln!("{}", "Signed out.".dimmed()),
            Err(e) => log::error!("Could not clear the stored session: {}", e),
        }
    }

    fn navigate_away(&self) {
        eprintln!(
            "  → {}",
            "This area needs permissions your account does not have.".dimmed()
        );
    }
}
