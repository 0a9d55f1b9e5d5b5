//! buildtidy: source tree maintenance tools
//!
//! Two independent tree walkers share this library:
//! - [`line_endings`] converts CRLF to LF in place
//! - [`downgrade`] writes Visual Studio 2005 copies of 2008 project files
//!
//! The binary is at src/main.rs.

pub mod cli;
pub mod config;
pub mod downgrade;
pub mod error_helpers;
pub mod interrupt;
pub mod line_endings;
pub mod logger;
pub mod rules;
pub mod walker;

// Re-export commonly used types for convenience
pub use config::Config;
pub use downgrade::{DowngradeReport, Downgrader, FileKind};
pub use interrupt::Outcome;
pub use line_endings::{normalize_bytes, NormalizeReport, Normalizer};
pub use rules::{Rule, RuleSet};
