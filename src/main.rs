mod api;
mod app;
mod chat;
mod config;
mod format;
mod markdown;
mod pagination;
mod theme;
mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use api::ApiClient;
use app::App;
use config::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "brewtab")]
#[command(version)]
#[command(about = "Browse coffee vending-machine sales and ask questions about them")]
struct Args {
    /// Base address of the sales API (e.g. http://localhost:5000/api)
    #[arg(long, env = "BREWTAB_API_URL")]
    api_url: Option<String>,

    /// Rows per page
    #[arg(long)]
    page_size: Option<u64>,

    /// Ask a question about the sales data and print the answer
    #[arg(short, long, value_name = "QUESTION")]
    ask: Option<String>,

    /// Print one page of sales as JSON
    #[arg(short, long)]
    dump: bool,

    /// Offset of the page printed by --dump
    #[arg(long, default_value_t = 0, requires = "dump")]
    offset: u64,

    /// Check that the API is up
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let cli_mode = args.ask.is_some() || args.dump || args.check;

    // Initialize logging
    init_logging(!cli_mode);

    let mut config = AppConfig::load().unwrap_or_default();
    if let Some(size) = args.page_size {
        config.page_size = size.max(1);
    }

    let api_url = config.resolve_api_url(args.api_url.as_deref());
    let client = ApiClient::new(&api_url, config.request_timeout())
        .with_context(|| format!("Cannot use API address {}", api_url))?;
    tracing::info!(api = client.base_url(), "starting brewtab");

    // Handle CLI-only commands
    if args.check {
        return check_api(&client).await;
    }

    if let Some(question) = args.ask {
        return ask_once(&client, &question).await;
    }

    if args.dump {
        return dump_page(&client, args.offset, config.page_size).await;
    }

    // Run TUI
    run_tui(config, client).await
}

/// TUI logs go to a file so they don't draw over the screen; CLI modes log to stderr
fn init_logging(to_file: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("brewtab=info"));
    let registry = tracing_subscriber::registry().with(filter);

    if !to_file {
        registry.with(fmt::layer().with_writer(io::stderr)).init();
        return;
    }

    match open_log_file() {
        Some(file) => registry
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .init(),
        None => registry.with(fmt::layer().with_writer(io::sink)).init(),
    }
}

fn open_log_file() -> Option<std::fs::File> {
    let dir = dirs::cache_dir()?.join("brewtab");
    std::fs::create_dir_all(&dir).ok()?;
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("brewtab.log"))
        .ok()
}

async fn check_api(client: &ApiClient) -> Result<()> {
    let health = client.health().await.context("Health check failed")?;
    if !health.is_ok() {
        anyhow::bail!("API reports status '{}'", health.status);
    }
    println!("{} is up", client.base_url());
    Ok(())
}

async fn ask_once(client: &ApiClient, question: &str) -> Result<()> {
    if question.trim().is_empty() {
        anyhow::bail!("Question is empty");
    }
    let answer = client.ask(question).await.context("Could not get an answer")?;
    println!("{}", markdown::to_plain(&answer.data));
    Ok(())
}

async fn dump_page(client: &ApiClient, offset: u64, limit: u64) -> Result<()> {
    let page = client
        .fetch_sales(offset, limit)
        .await
        .context("Could not fetch sales")?;
    println!("{}", serde_json::to_string_pretty(&page)?);
    Ok(())
}

async fn run_tui(config: AppConfig, client: ApiClient) -> Result<()> {
    ui::init_theme(config.theme_file.as_deref());

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Create app state and fetch the first page
    let mut app = App::new(config, client);
    app.request_page();

    // Main loop
    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        // Poll without blocking the runtime so request tasks keep running
        let ready = tokio::task::block_in_place(|| event::poll(std::time::Duration::from_millis(100)))?;
        if ready {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') if app.accepts_quit() => return Ok(()),
                        KeyCode::Char('c') if key.modifiers.contains(event::KeyModifiers::CONTROL) => {
                            return Ok(())
                        }
                        _ => {
                            // Handle key and catch any errors to prevent crashes
                            if let Err(e) = app.handle_key(key) {
                                app.set_status(format!("Error: {}", e));
                            }
                        }
                    }
                }
            }
        }

        app.tick();
    }
}
