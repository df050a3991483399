mod aggregate;
mod app;
mod cache;
mod config;
mod constants;
mod controller;
mod format;
mod input;
mod mapper;
#[cfg(test)]
mod testing;
mod theme;
mod ui;
mod youtube;

use anyhow::{Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use directories::ProjectDirs;
use ratatui::{
  DefaultTerminal,
  crossterm::event::{self, Event, KeyEventKind},
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use app::{App, AppMode};
use cache::{CacheOptions, SearchCache};
use config::Config;
use constants::constants;
use controller::{Notice, ResultsView, SearchController, SearchSettings, SortOrder};
use format::format_relative_date;
use youtube::{ResultType, YouTubeClient};

// --- CLI ---

#[derive(Parser, Debug)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about, long_about = None)]
struct Args {
  /// YouTube Data API key (overrides the environment and prefs)
  #[arg(long, global = true)]
  api_key: Option<String>,

  /// Results requested per page
  #[arg(long, global = true)]
  max_results: Option<u32>,

  /// Restrict search results to 'video', 'channel' or 'playlist'
  #[arg(long = "type", global = true, default_value = "video")]
  result_type: ResultType,

  /// Start the TUI with this query already searched
  #[arg(short, long)]
  query: Option<String>,

  /// Print shell completions and exit
  #[arg(long, value_name = "SHELL")]
  completions: Option<Shell>,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Search once and print the results
  Search {
    query: String,
    /// 'relevance', 'date' or 'date-asc'
    #[arg(long, default_value = "relevance", value_parser = ["relevance", "date", "date-asc"])]
    sort: String,
    /// Number of pages to load
    #[arg(long, default_value_t = 1)]
    pages: usize,
    /// Print the records as JSON
    #[arg(long)]
    json: bool,
  },
}

// --- Logging ---

/// Log to a file in the data dir; the terminal belongs to the TUI.
fn init_tracing() -> Option<WorkerGuard> {
  let proj_dirs = ProjectDirs::from("", "", "tubelearn")?;
  let log_dir = proj_dirs.data_dir();
  std::fs::create_dir_all(log_dir).ok()?;
  let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(log_dir, "tubelearn.log"));
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  tracing_subscriber::fmt().with_env_filter(filter).with_writer(writer).with_ansi(false).init();
  Some(guard)
}

// --- Main ---

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  if let Some(shell) = args.completions {
    clap_complete::generate(shell, &mut Args::command(), "tubelearn", &mut std::io::stdout());
    return Ok(());
  }

  let _guard = init_tracing();
  let config = Config::load();
  // Without a key the API rejects every request; that surfaces as a fetch failure.
  let api_key = config.resolve_api_key(args.api_key.as_deref());
  let missing_key = api_key.is_none();
  let settings = SearchSettings {
    max_results: config.max_results(args.max_results),
    result_type: args.result_type,
    ..Default::default()
  };

  let client = Arc::new(YouTubeClient::new(&constants().api_base_url, api_key.unwrap_or_default()));
  let cache = SearchCache::new(client.clone(), CacheOptions::default());

  if let Some(Command::Search { query, sort, pages, json }) = args.command {
    let settings = SearchSettings { sort_order: SortOrder::from_config(&sort), ..settings };
    return search_once(&cache, &query, settings, pages, json).await;
  }

  let mut app = App::new(cache, client, &config, settings);
  if missing_key {
    app.set_error(format!("No API key: pass --api-key or set {}", constants().api_key_env));
  }
  if let Some(query) = args.query {
    app.enter_mode(AppMode::Input);
    app.input = query;
    app.cursor_position = app.input.chars().count();
    app.on_input_changed();
    app.submit_search();
  }

  let default_hook = std::panic::take_hook();
  std::panic::set_hook(Box::new(move |info| {
    ratatui::restore();
    default_hook(info);
  }));

  let mut terminal = ratatui::init();
  let result = run(&mut terminal, app).await;
  ratatui::restore();
  result
}

async fn run(terminal: &mut DefaultTerminal, mut app: App) -> Result<()> {
  info!("tubelearn: started");
  loop {
    app.tick();

    terminal.draw(|frame| ui::ui(frame, &mut app))?;

    if event::poll(Duration::from_millis(100))? {
      match event::read()? {
        Event::Key(key) if key.kind == KeyEventKind::Press => {
          input::handle_key_event(&mut app, key);
        }
        _ => {}
      }
    }

    if app.should_quit {
      break;
    }
  }
  info!("tubelearn: exiting");
  Ok(())
}

/// Load up to `pages` pages for `query`. Paging stops at the first failed
/// next-page fetch; the pages already loaded stay in the returned view.
async fn collect_pages(cache: &SearchCache, query: &str, settings: SearchSettings, pages: usize) -> ResultsView {
  let mut controller = SearchController::new(cache, settings);
  controller.set_input(query);
  controller.submit();
  controller.subscription().settled().await;

  for loaded in 1..pages {
    let Some(next) = controller.request_next_page() else { break };
    if let Err(e) = next.await {
      warn!(loaded, error = %e, "search: next page failed, keeping loaded pages");
      break;
    }
  }
  controller.read()
}

/// Non-interactive search: load `pages` pages and print the merged list.
async fn search_once(
  cache: &SearchCache,
  query: &str,
  settings: SearchSettings,
  pages: usize,
  json: bool,
) -> Result<()> {
  let sort_order = settings.sort_order;
  let view = collect_pages(cache, query, settings, pages).await;

  if view.display_records.is_empty()
    && let Some(message) = view.notice.message(query)
  {
    if view.notice.is_error() {
      return Err(anyhow!(message));
    }
    println!("{}", message);
    return Ok(());
  }

  if json {
    println!("{}", serde_json::to_string_pretty(&view.display_records)?);
  } else {
    let now = chrono::Utc::now();
    for record in &view.display_records {
      let age = format_relative_date(record.published_at, now);
      println!("{}  {}  ({}, {})", record.id, record.title, record.channel_title, age);
      println!("    {}", record.url());
    }
    let shown = view.display_records.len();
    println!("{} shown of {} reported ({})", shown, view.total_results_reported, sort_order.label());
  }

  if let Notice::Failed(err) = view.notice {
    return Err(anyhow::Error::new(err).context("Failed to load next page; earlier results were printed"));
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::{ScriptedTransport, page};
  use crate::youtube::TransportError;

  fn failing_second_page() -> SearchCache {
    let transport = ScriptedTransport::new();
    transport.respond("rust async", None, Ok(page(&["a", "b"], Some("t1"))));
    transport.respond("rust async", Some("t1"), Err(TransportError::from_status(500, "backend error".into())));
    SearchCache::new(transport, CacheOptions::default())
  }

  #[tokio::test]
  async fn next_page_failure_keeps_loaded_records() {
    let cache = failing_second_page();
    let view = collect_pages(&cache, "rust async", SearchSettings::default(), 3).await;
    let ids: Vec<&str> = view.display_records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["a", "b"]);
    assert!(view.notice.is_error());
  }

  #[tokio::test]
  async fn search_reports_next_page_failure_after_printing() {
    let cache = failing_second_page();
    let result = search_once(&cache, "rust async", SearchSettings::default(), 2, false).await;
    let err = result.unwrap_err();
    assert!(err.to_string().contains("earlier results were printed"));
  }

  #[tokio::test]
  async fn search_without_failure_succeeds() {
    let transport = ScriptedTransport::new();
    transport.respond("rust async", None, Ok(page(&["a"], None)));
    let cache = SearchCache::new(transport, CacheOptions::default());
    assert!(search_once(&cache, "rust async", SearchSettings::default(), 2, true).await.is_ok());
  }
}
