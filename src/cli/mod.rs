//! CLI subcommands that run without a server.
//!
//! ## Usage
//!
//! ```bash
//! chatbot-runtime config show      # Effective configuration
//! chatbot-runtime config defaults  # Built-in defaults
//! chatbot-runtime config validate  # Exit 1 on warnings
//! ```

pub mod config_cmd;
