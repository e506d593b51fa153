//! The `klod` command: chat with Claude from the terminal.

#[macro_use]
extern crate tracing;

mod terminal;

use std::process::ExitCode;

use clap::Parser;
use klod::config::{self, Settings};
use klod::core::ConversationBuilder;
use klod::FileSessionLog;
use klod_anthropic_model::AnthropicProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use crate::terminal::Terminal;

/// Chat with Claude from the terminal.
///
/// The words of PROMPT are joined with spaces and sent as the first
/// message; the conversation then continues interactively until you type
/// `exit`, `quit` or an empty line.
#[derive(Debug, Parser)]
#[command(name = "klod", version)]
struct Cli {
    /// The first message to send.
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    prompt: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Logs go to stderr so that stdout only carries the conversation.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .from_env_lossy(),
        )
        .init();

    let cli = Cli::parse();

    if let Err(err) = config::load_config_file() {
        warn!("could not load config file: {err}");
    }
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("Error: {err}");
            return ExitCode::FAILURE;
        }
    };
    debug!("settings: {settings:?}");

    let provider = AnthropicProvider::new(settings.provider_config());
    debug!("using model {}", provider.config().model());
    let mut builder = ConversationBuilder::with_model_provider(provider);
    if let Some(system_prompt) = &settings.system_prompt {
        builder = builder.with_system_prompt(system_prompt);
    }
    if let Some(path) = &settings.session_log {
        info!("logging session to {}", path.display());
        builder = builder.with_session_log(FileSessionLog::new(path));
    }
    let mut conversation = builder.build();

    let mut terminal = Terminal::new();
    let prompt = cli.prompt.join(" ");
    match conversation.run(&prompt, &mut terminal).await {
        Ok(()) => ExitCode::SUCCESS,
        // The terminal has already printed the error.
        Err(err) => {
            debug!("first turn failed: {err:?}");
            ExitCode::FAILURE
        }
    }
}
