use std::io::{self as std_io, Write as _};
use std::time::Duration;

use crossterm::terminal;
use indicatif::{ProgressBar, ProgressStyle};
use klod::core::Frontend;
use klod_model::{ModelFinishReason, ModelProviderError};
use owo_colors::OwoColorize;
use tokio::io::{self, AsyncBufReadExt, BufReader, Stdin};

const DEFAULT_WIDTH: usize = 80;
const SEPARATOR_CHAR: &str = "─";

/// The interactive terminal: reads prompts from stdin and streams replies
/// to stdout.
pub struct Terminal {
    stdin: BufReader<Stdin>,
    spinner_style: ProgressStyle,
    spinner: Option<ProgressBar>,
}

impl Terminal {
    pub fn new() -> Self {
        let spinner_style =
            ProgressStyle::with_template("{spinner} {wide_msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        Self {
            stdin: BufReader::new(io::stdin()),
            spinner_style,
            spinner: None,
        }
    }

    /// Clears the spinner and prints the reply prefix, once per reply.
    fn begin_output(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
            print!("{}", "Assistant: ".blue());
        }
    }
}

impl Frontend for Terminal {
    async fn read_input(&mut self) -> Option<String> {
        print!("{}", "You (or 'exit' to quit): ".green());
        std_io::stdout().flush().ok();

        let mut line = String::new();
        match self.stdin.read_line(&mut line).await {
            Ok(0) => None,
            Ok(_) => Some(line),
            Err(err) => {
                error!("error reading input: {}", err);
                None
            }
        }
    }

    fn reply_started(&mut self) {
        print_separator();
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(self.spinner_style.clone());
        spinner.set_message("🤔 Thinking...");
        spinner.enable_steady_tick(Duration::from_millis(100));
        self.spinner = Some(spinner);
    }

    fn reply_delta(&mut self, delta: &str) {
        self.begin_output();
        print!("{delta}");
        std_io::stdout().flush().ok();
    }

    fn reply_finished(&mut self, finish_reason: Option<ModelFinishReason>) {
        self.begin_output();
        println!();
        if finish_reason == Some(ModelFinishReason::MaxTokens) {
            let notice = "(reply cut off at the output token limit)";
            eprintln!("{}", notice.yellow());
        }
        print_separator();
    }

    fn turn_failed(&mut self, error: &dyn ModelProviderError) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        } else {
            // Finish the partially streamed line.
            println!();
        }
        eprintln!("{} {error}", "Error:".red());
    }

    fn goodbye(&mut self) {
        println!("Goodbye!");
    }
}

fn print_separator() {
    let width = terminal::size()
        .map(|(columns, _)| usize::from(columns))
        .ok()
        .filter(|&columns| columns > 0)
        .unwrap_or(DEFAULT_WIDTH);
    println!("{}", SEPARATOR_CHAR.repeat(width));
}
