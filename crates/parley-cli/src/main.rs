//! parley - streaming chat client for OpenAI-compatible endpoints

mod config;
mod ui;

use clap::Parser;
use parley_ai::{EmptyFramePolicy, providers::openai::OpenAIProvider};
use parley_chat::{Chat, ChatSession};
use std::io::{self, IsTerminal, Write};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// parley - chat with a language model from the terminal
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Model to use (default: gpt-4)
    #[arg(short, long)]
    model: Option<String>,

    /// Maximum tokens per reply
    #[arg(long)]
    max_tokens: Option<u32>,

    /// Sampling temperature (0.0 - 2.0)
    #[arg(short, long)]
    temperature: Option<f32>,

    /// Base URL of an OpenAI-compatible server
    #[arg(long)]
    base_url: Option<String>,

    /// Frames without JSON objects: end-stream or skip-unless-done
    #[arg(long, value_parser = parse_empty_frame_policy)]
    empty_frame_policy: Option<EmptyFramePolicy>,

    /// Ask a single question, print the reply and exit
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Disable TUI mode (use simple stdin/stdout)
    #[arg(long)]
    no_tui: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,
}

fn parse_empty_frame_policy(s: &str) -> Result<EmptyFramePolicy, String> {
    match s.to_lowercase().as_str() {
        "end-stream" => Ok(EmptyFramePolicy::EndStream),
        "skip-unless-done" => Ok(EmptyFramePolicy::SkipUnlessDone),
        other => Err(format!(
            "unknown policy '{}' (expected end-stream or skip-unless-done)",
            other
        )),
    }
}

/// Send logs to stderr, or to a file when the screen belongs to the TUI
fn init_tracing(to_file: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("parley_ai=debug,parley_chat=debug,parley_tui=debug,parley_cli=debug")
    });

    if to_file {
        let dir = config::Config::config_dir();
        std::fs::create_dir_all(&dir)?;
        let file = std::fs::File::create(dir.join("parley.log"))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize config and exit
    if args.init_config {
        match config::Config::init() {
            Ok(path) => {
                println!("Config file created at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let cfg = config::Config::load();
    let use_tui = args.command.is_none() && !args.no_tui && cfg.tui.unwrap_or(true);

    if args.verbose {
        init_tracing(use_tui)?;
    }

    // Merge config with CLI args (CLI takes precedence)
    let mut completion = cfg.completion_config();
    if let Some(model) = args.model {
        completion.model = model;
    }
    if let Some(max_tokens) = args.max_tokens {
        completion.max_tokens = max_tokens;
    }
    if let Some(temperature) = args.temperature {
        completion.temperature = temperature;
    }
    completion.validate()?;

    let Some(api_key) = cfg.api_key() else {
        eprintln!("Error: No API key found");
        eprintln!();
        eprintln!(
            "Set your API key with: export {}=your-key",
            parley_ai::providers::openai::API_KEY_ENV
        );
        eprintln!("Or add it to config file: parley --init-config");
        std::process::exit(1);
    };

    let policy = args
        .empty_frame_policy
        .or(cfg.empty_frame_policy)
        .unwrap_or_default();
    let mut provider = OpenAIProvider::new(api_key).with_empty_frame_policy(policy);
    if let Some(base_url) = args.base_url.or(cfg.base_url.clone()) {
        provider = provider.with_base_url(base_url);
    }
    tracing::debug!(model = %completion.model, endpoint = %provider.endpoint(), "Starting");

    let session = ChatSession::new(cfg.system_prompt());
    let mut chat = Chat::new(session, Arc::new(provider), completion);

    // Non-interactive mode
    if let Some(command) = args.command {
        return run_command(&mut chat, &command).await;
    }

    if use_tui {
        let theme = cfg.theme.unwrap_or_default().into();
        return ui::run_tui(&mut chat, theme).await;
    }

    run_interactive(&mut chat).await
}

/// Submit `text` and print the reply as it streams in
async fn stream_reply(chat: &mut Chat, text: &str) -> anyhow::Result<()> {
    chat.submit(text)?;

    let mut printed = String::new();
    let mut stdout = io::stdout();
    while chat.session().is_loading() {
        if !chat.next_update().await {
            continue;
        }
        let Some(turn) = chat.session().conversation().last() else {
            continue;
        };
        if !turn.is_assistant() {
            continue;
        }
        // Buffers only ever grow, so print the new suffix
        match turn.content.strip_prefix(printed.as_str()) {
            Some(new_text) => print!("{}", new_text),
            None => print!("\n{}", turn.content),
        }
        stdout.flush()?;
        printed.clone_from(&turn.content);
    }
    println!();

    chat.wait_idle().await?;
    Ok(())
}

async fn run_command(chat: &mut Chat, command: &str) -> anyhow::Result<()> {
    if let Err(e) = stream_reply(chat, command).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

async fn run_interactive(chat: &mut Chat) -> anyhow::Result<()> {
    // Show minimal startup info (only if TTY)
    if io::stderr().is_terminal() {
        eprintln!("parley ({})", chat.config().model);
        eprintln!("Type /reset to start over, /quit to exit.");
        eprintln!();
    }

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            // EOF
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        match input {
            "/quit" | "/exit" => break,
            "/reset" => {
                chat.reset();
                println!("Conversation reset.");
                println!();
                continue;
            }
            "/help" => {
                println!("/reset  discard the conversation");
                println!("/quit   exit");
                println!();
                continue;
            }
            _ => {}
        }

        println!();
        if let Err(e) = stream_reply(chat, input).await {
            eprintln!("Error: {}", e);
        }
        println!();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_frame_policy() {
        assert_eq!(
            parse_empty_frame_policy("end-stream"),
            Ok(EmptyFramePolicy::EndStream)
        );
        assert_eq!(
            parse_empty_frame_policy("Skip-Unless-Done"),
            Ok(EmptyFramePolicy::SkipUnlessDone)
        );
        assert!(parse_empty_frame_policy("never").is_err());
    }

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from([
            "parley",
            "-m",
            "gpt-4o",
            "--temperature",
            "0.2",
            "--empty-frame-policy",
            "skip-unless-done",
            "-c",
            "What is 2+2?",
        ]);
        assert_eq!(args.model.as_deref(), Some("gpt-4o"));
        assert_eq!(args.temperature, Some(0.2));
        assert_eq!(
            args.empty_frame_policy,
            Some(EmptyFramePolicy::SkipUnlessDone)
        );
        assert_eq!(args.command.as_deref(), Some("What is 2+2?"));
    }
}
