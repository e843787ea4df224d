//! Staff administration models

use serde::{Deserialize, Serialize};

/// A named server-side kill switch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillSwitch {
    pub name: String,
    pub enabled: bool,
}

/// Server log verbosity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLevel {
    pub level: String,
}
