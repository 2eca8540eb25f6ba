//! repostalker - browse a GitHub account and its followers from the terminal.
//!
//! Profiles, follower lists and avatars are cached locally and refreshed
//! from GitHub once older than the configured invalidation interval.

mod shell;

use std::io;
use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use repostalker_core::api::GithubClient;
use repostalker_core::cache::CacheManager;
use repostalker_core::config::{Config, ConfigStore};
use repostalker_core::interactor::SyncInteractor;
use repostalker_core::nav::Navigator;
use repostalker_core::presenter::{
    CurrentPresenter, CurrentViewEvent, FollowerListPresenter, MainPresenter, MainViewEvent,
    Presenter, DEFAULT_USER,
};

use shell::Command;

/// Directory for an optional rolling log file
const LOG_DIR_ENV: &str = "REPOSTALKER_LOG_DIR";

/// Initialize the tracing subscriber for logging.
///
/// The returned guard must stay alive for the file writer to flush.
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var(LOG_DIR_ENV) {
        Ok(dir) if !dir.is_empty() => {
            let appender = tracing_appender::rolling::daily(dir, "repostalker.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();
    guard
}

/// Every collaborator, constructed once for the life of the process.
struct App {
    cache: Arc<CacheManager>,
    main: MainPresenter,
    current: CurrentPresenter,
    followers: FollowerListPresenter,
}

impl App {
    fn new() -> Result<Self> {
        let settings = Arc::new(ConfigStore::open(Config::config_path()?)?);
        let mut config = settings.config();
        config.apply_overrides(|key| std::env::var(key).ok());

        let cache = Arc::new(CacheManager::new(config.cache_dir()?)?);
        let remote = Arc::new(match config.api_base_url.as_deref() {
            Some(url) => GithubClient::with_base_url(url)?,
            None => GithubClient::new()?,
        });
        let default_user = config
            .default_user
            .clone()
            .unwrap_or_else(|| DEFAULT_USER.to_string());
        info!(default_user = %default_user, cache_dir = %cache.cache_dir().display(), "Starting");

        let interactor = Arc::new(SyncInteractor::new(
            Navigator::spawn(),
            settings,
            cache.clone(),
            remote,
        ));

        Ok(Self {
            cache,
            main: MainPresenter::new(interactor.clone()),
            current: CurrentPresenter::new(interactor.clone(), default_user.clone()),
            followers: FollowerListPresenter::new(interactor, default_user),
        })
    }

    fn on_ready(&self) {
        self.main.on_ready();
        self.current.on_ready();
        self.followers.on_ready();
    }

    fn on_unready(&self) {
        self.followers.on_unready();
        self.current.on_unready();
        self.main.on_unready();
    }

    /// Returns false when the shell should exit.
    fn dispatch(&self, command: Command) -> bool {
        debug!(?command, "Dispatching command");
        match command {
            Command::Follow(login) => self.followers.user_requested_follower(&login),
            Command::Filter(text) => self.followers.user_requested_follower_list_filter(&text),
            Command::Back => self.main.user_requested_back_nav(),
            Command::Settings => self.main.user_requested_settings(),
            Command::Save(seconds) => self.main.user_saved_settings(&seconds),
            Command::Cancel => self.main.user_canceled_settings(),
            Command::ClearCache => match self.cache.clear() {
                Ok(()) => println!("Cache cleared"),
                Err(e) => eprintln!("Error: {:#}", e),
            },
            Command::Help => println!("{}", shell::HELP),
            Command::Quit => return false,
        }
        true
    }

    fn cached_age(&self, event: &CurrentViewEvent) -> Option<String> {
        match event {
            CurrentViewEvent::UserDetails(details) => self
                .cache
                .cached_user(&details.user_name)
                .map(|row| row.age_display()),
            _ => None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _log_guard = init_tracing();

    let app = App::new()?;

    // Subscribe before ready so nothing emitted while starting up is missed
    let mut main_events = app.main.events();
    let mut current_events = app.current.events();
    let mut follower_events = app.followers.events();
    app.on_ready();

    println!("{}", shell::HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            event = main_events.recv() => match event {
                Ok(MainViewEvent::NavBack) => break,
                Ok(event) => {
                    if let Some(text) = shell::render_main(&event) {
                        println!("{}", text);
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Dropped main screen events"),
                Err(RecvError::Closed) => break,
            },
            event = current_events.recv() => match event {
                Ok(event) => println!("{}", shell::render_current(&event, app.cached_age(&event))),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Dropped user events"),
                Err(RecvError::Closed) => break,
            },
            event = follower_events.recv() => match event {
                Ok(event) => println!("{}", shell::render_follower_list(&event)),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Dropped follower events"),
                Err(RecvError::Closed) => break,
            },
            line = lines.next_line() => match line? {
                Some(line) => match Command::parse(&line) {
                    Ok(Some(command)) => {
                        if !app.dispatch(command) {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(message) => eprintln!("{}", message),
                },
                None => break,
            },
        }
    }

    app.on_unready();
    info!("Shutting down");
    Ok(())
}
