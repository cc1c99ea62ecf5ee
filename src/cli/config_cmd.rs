//! Config CLI subcommands: show, defaults, validate.
//!
//! These read configuration straight from the environment; no server needed.

use crate::config::{self, Settings};

/// Print effective config as key-value pairs to stdout.
pub fn run_show() {
    print_entries(&config::load());
}

/// Print default values, ignoring the environment.
pub fn run_defaults() {
    print_entries(&Settings::default());
}

/// Report likely misconfigurations.
///
/// Returns 0 if valid, 1 if any warnings are found.
pub fn run_validate() -> i32 {
    validate(&config::load())
}

fn validate(settings: &Settings) -> i32 {
    let warnings = settings.warnings();
    if warnings.is_empty() {
        println!("Configuration is valid.");
        return 0;
    }
    for warning in &warnings {
        eprintln!("WARNING: {warning}");
    }
    1
}

fn print_entries(settings: &Settings) {
    for (key, value) in settings.entries() {
        println!("{key}={value}");
    }
}
