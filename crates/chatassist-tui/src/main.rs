mod app;
mod handler;
#[cfg(test)]
mod testing;
mod tui;
mod ui;

use std::fs::{self, OpenOptions};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use app::App;
use chatassist_core::{Config, ConversationController, GeminiClient, PersonaRegistry};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "chatassist=info,chatassist_core=info";

/// Logs go to a file; the terminal belongs to the UI
fn init_logging() -> Result<()> {
    let path = Config::log_path()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create log directory")?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(err) = init_logging() {
        eprintln!("Logging disabled: {:#}", err);
    }

    let config = Config::load().unwrap_or_else(|err| {
        tracing::warn!(error = %err, "Failed to load config, using defaults");
        Config::new()
    });

    let api_key = config.resolve_api_key();
    let client = GeminiClient::from_config(&config, api_key.as_deref().unwrap_or_default())?;
    tracing::info!(model = client.model(), "Using Gemini backend");

    let controller = ConversationController::new(
        Arc::new(client),
        PersonaRegistry::builtin(),
        config.default_persona(),
    );

    let mut app = App::new(controller, config);
    if api_key.is_none() {
        app.open_api_key_input();
    }

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();

    let result = run(&mut terminal, &mut events, &mut app).await;

    tui::restore()?;
    result
}

async fn run(terminal: &mut tui::Tui, events: &mut tui::EventHandler, app: &mut App) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event),
            None => break,
        }

        app.poll_pending().await;
    }

    tracing::info!("Session ended");
    Ok(())
}
