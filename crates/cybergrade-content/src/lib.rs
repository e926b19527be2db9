//! cybergrade-content: content loading and configuration.
//!
//! Loads lab, quiz and exam definitions from a directory of TOML files into a
//! [`ContentVersion`](cybergrade_core::ContentVersion), and reads the
//! cybergrade config file and user roster.

pub mod config;
pub mod loader;

pub use config::{load_config, load_config_from, load_roster, CybergradeConfig};
pub use loader::{
    content_warnings, load_content_dir, ContentWarning, DirectoryContentSource, LoadOptions,
};
