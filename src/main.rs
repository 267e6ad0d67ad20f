//! ochat binary entry point.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::LinesStream;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ochat::agent::Conversation;
use ochat::cli::{console_sink, Cli};
use ochat::config::OchatConfig;
use ochat::error::OchatError;
use ochat::provider::ResponsesService;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse_args();
    let code = match run(cli).await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {e}");
            if let Some(hint) = e.recovery_suggestion().hint() {
                eprintln!("Hint: {hint}");
            }
            1
        }
    };
    // A pending stdin read holds a blocking thread the runtime would wait on.
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<(), OchatError> {
    let mut config = OchatConfig::load(cli.config.as_deref())?;
    config.apply_env();
    cli.apply_to(&mut config)?;
    config.validate()?;

    let service = Arc::new(ResponsesService::new(
        config.api_key()?,
        Some(config.base_url.clone()),
    ));
    let mut conversation = Conversation::new(service, config.conversation_settings())
        .with_event_sink(console_sink());

    // An unreachable server costs its tools, not the session.
    for provider in config.providers() {
        match conversation.register_provider(&provider).await {
            Ok(count) => info!(provider = %provider.name(), count, "provider ready"),
            Err(err) => {
                warn!(provider = %provider.name(), error = %err, "capability discovery failed");
                println!("[system] provider '{}' unavailable: {err}", provider.name());
            }
        }
    }

    let cancel = CancellationToken::new();
    let running = conversation.running().clone();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            running.stop();
            token.cancel();
        }
    });

    let lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());
    conversation.run_interactive(lines, cancel).await
}
