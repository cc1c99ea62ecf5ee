//! Chatbot Runtime entry point.
//!
//! ## CLI Subcommands
//!
//! - `chatbot-runtime` or `chatbot-runtime serve` - Run the HTTP server (default)
//! - `chatbot-runtime config show|defaults|validate` - Inspect configuration
//! - `chatbot-runtime version` - Print version

use std::process::ExitCode;

use chatbot_runtime::cli::config_cmd;
use chatbot_runtime::config as chat_config;
use chatbot_runtime::runtime::default_backend;
use chatbot_runtime::telemetry;

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("serve");

    match command {
        "serve" | "" => {
            let settings = chat_config::load();
            if let Err(e) = telemetry::init_logging(&settings.log) {
                eprintln!("Logging setup failed: {}", e);
                return ExitCode::FAILURE;
            }
            telemetry::describe_metrics();

            match chatbot_runtime::run(settings, default_backend()).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    tracing::error!(error = %e, "Server exited with error");
                    eprintln!("Server error: {}", e);
                    ExitCode::FAILURE
                }
            }
        }
        "config" => {
            let subcommand = args.get(2).map(|s| s.as_str()).unwrap_or("show");
            match subcommand {
                "show" => {
                    config_cmd::run_show();
                    ExitCode::SUCCESS
                }
                "defaults" => {
                    config_cmd::run_defaults();
                    ExitCode::SUCCESS
                }
                "validate" => {
                    let code = config_cmd::run_validate();
                    ExitCode::from(code as u8)
                }
                _ => {
                    eprintln!("Unknown config subcommand: {}", subcommand);
                    print_usage();
                    ExitCode::FAILURE
                }
            }
        }
        "help" | "--help" | "-h" => {
            print_usage();
            ExitCode::SUCCESS
        }
        "version" | "--version" | "-V" => {
            println!("chatbot-runtime {}", chatbot_runtime::VERSION);
            ExitCode::SUCCESS
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            ExitCode::FAILURE
        }
    }
}

fn print_usage() {
    eprintln!(
        "chatbot-runtime v{}

USAGE:
    chatbot-runtime [COMMAND]

COMMANDS:
    serve              Run the HTTP server (default when no command given)
    config show        Print effective configuration
    config defaults    Print built-in defaults
    config validate    Check configuration (exit 1 on warnings)
    version            Show version information
    help               Show this help message

ENVIRONMENT:
    CHATBOT_HOST, CHATBOT_PORT       Bind address (default 0.0.0.0:8000)
    CHATBOT_DATA_DIR                 State root (default ./.state)
    CHATBOT_MODELS_DIR               Uploaded models (default <data>/models)
    CHATBOT_DATABASE_PATH            SQLite file (default <data>/chatbot.db)
    CHATBOT_LOG_FORMAT               json or pretty
    RUST_LOG                         Overrides CHATBOT_LOG_LEVEL

    Run `chatbot-runtime config defaults` for the full list.
",
        chatbot_runtime::VERSION
    );
}
