use anyhow::{bail, Context, Result};
use chrono::Utc;
use chrono_tz::Tz;
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use event_feed_lib::config::{AppConfig, ConfigStore};
use event_feed_lib::db::Store;
use event_feed_lib::debounce::Debouncer;
use event_feed_lib::location::{FixedLocation, LocationProvider};
use event_feed_lib::remote::BackendClient;
use event_feed_lib::{logs, render};
use event_feed_lib::{CategoryFilter, EventSource, FeedSession, FeedState, GeoPoint, MissingCoordinates};

#[derive(Parser)]
#[command(name = "event-feed")]
#[command(about = "Browse upcoming events near you", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch events and categories from the backend into the local store
    Sync,
    /// Print the upcoming events that match the filters
    List {
        #[command(flatten)]
        filters: FilterArgs,
        /// Case-insensitive text to look for in title or location
        #[arg(long, short)]
        query: Option<String>,
    },
    /// Print the known categories
    Categories {
        /// Read from the backend instead of the local store
        #[arg(long)]
        live: bool,
    },
    /// Read search text from stdin, one line per keystroke batch, and print
    /// the matching events once typing pauses
    Search {
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Show or change the stored configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args)]
struct FilterArgs {
    /// Category id, or "all"
    #[arg(long, short, default_value = "all")]
    category: CategoryFilter,
    /// Latitude of the search origin (defaults to the configured home)
    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    lat: Option<f64>,
    /// Longitude of the search origin
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    lon: Option<f64>,
    /// Maximum distance from the origin
    #[arg(long)]
    radius_km: Option<f64>,
    /// Hide events without coordinates when filtering by distance
    #[arg(long)]
    exclude_unlocated: bool,
    /// Read from the backend instead of the local store
    #[arg(long)]
    live: bool,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the configuration (secrets masked)
    Show,
    /// Set a key; an empty value clears it
    Set { key: String, value: String },
    /// Print where the configuration file lives
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logs::init_logger(logs::level_from(cli.verbose))?;

    let config_store = ConfigStore::load();
    let config = config_store.read().with_env_overrides();

    match cli.command {
        Command::Sync => sync(&config).await,
        Command::List { filters, query } => {
            let query = query.unwrap_or_default();
            if filters.live {
                let client = BackendClient::from_config(&config)?;
                list(client, &config, &filters, &query).await
            } else {
                list(load_snapshot().await?, &config, &filters, &query).await
            }
        }
        Command::Categories { live } => categories(&config, live).await,
        Command::Search { filters } => {
            if filters.live {
                let client = BackendClient::from_config(&config)?;
                search(client, &config, &filters).await
            } else {
                search(load_snapshot().await?, &config, &filters).await
            }
        }
        Command::Config { action } => configure(&config_store, action),
    }
}

async fn sync(config: &AppConfig) -> Result<()> {
    let client = BackendClient::from_config(config)?;
    let (events, categories) = tokio::try_join!(client.fetch_events(), client.fetch_categories())
        .map_err(|err| anyhow::anyhow!("{}\n{err}", err.user_message()))?;

    let synced_at = Utc::now();
    let (event_count, category_count) = (events.len(), categories.len());
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut store = Store::open_default().context("failed to open local store")?;
        store
            .replace_snapshot(&events, &categories, synced_at)
            .context("failed to save snapshot")
    })
    .await??;

    log::info!("synced {event_count} events and {category_count} categories");
    println!("Synced {event_count} events and {category_count} categories.");
    Ok(())
}

async fn load_snapshot() -> Result<event_feed_lib::session::SnapshotSource> {
    let (snapshot, last_synced) = tokio::task::spawn_blocking(|| -> Result<_> {
        let store = Store::open_default().context("failed to open local store")?;
        let snapshot = store.snapshot().context("failed to read local store")?;
        Ok((snapshot, store.last_synced()?))
    })
    .await??;

    match last_synced {
        Some(at) => log::debug!("using snapshot from {at}"),
        None => log::warn!("local store is empty; run `event-feed sync` first"),
    }
    Ok(snapshot)
}

fn origin_for(filters: &FilterArgs, config: &AppConfig) -> Result<FixedLocation> {
    match (filters.lat, filters.lon) {
        (Some(lat), Some(lon)) => match GeoPoint::checked(lat, lon) {
            Some(point) => Ok(FixedLocation(Some(point))),
            None => bail!("coordinates out of range: {lat}, {lon}"),
        },
        _ => Ok(FixedLocation(config.home())),
    }
}

async fn open_session<S: EventSource>(
    source: S,
    config: &AppConfig,
    filters: &FilterArgs,
) -> Result<FeedSession<S, FixedLocation>> {
    let location = origin_for(filters, config)?;
    let mut session = FeedSession::new(source, location, config.location_timeout());
    session.set_category(filters.category.clone());
    session.set_radius_km(filters.radius_km.unwrap_or_else(|| config.radius_km()));
    if filters.exclude_unlocated {
        session.set_missing_coordinates(MissingCoordinates::Exclude);
    }

    if let FeedState::Failed(err) = session.refresh().await {
        bail!("{}\n{err}", err.user_message());
    }
    Ok(session)
}

fn print_feed<S: EventSource, L: LocationProvider>(session: &FeedSession<S, L>, tz: Tz) {
    let visible = session.visible_events(Utc::now());
    if visible.is_empty() {
        println!("No upcoming events match.");
        return;
    }
    for event in visible {
        println!(
            "{}\n",
            render::event_block(event, tz, session.origin(), session.categories())
        );
    }
}

async fn list<S: EventSource>(
    source: S,
    config: &AppConfig,
    filters: &FilterArgs,
    query: &str,
) -> Result<()> {
    let mut session = open_session(source, config, filters).await?;
    session.set_query(query);
    print_feed(&session, config.tz());
    Ok(())
}

async fn search<S: EventSource>(source: S, config: &AppConfig, filters: &FilterArgs) -> Result<()> {
    let mut session = open_session(source, config, filters).await?;
    let tz = config.tz();
    let (mut debouncer, mut settled) = Debouncer::new(config.search_debounce());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(text) => debouncer.push(text),
                None => break,
            },
            Some(query) = settled.recv() => {
                show_search(&mut session, query, tz);
            }
        }
    }

    // Input closed: let the last query settle instead of dropping it.
    if debouncer.is_pending() {
        if let Some(query) = settled.recv().await {
            show_search(&mut session, query, tz);
        }
    } else if let Ok(query) = settled.try_recv() {
        show_search(&mut session, query, tz);
    }
    Ok(())
}

fn show_search<S: EventSource, L: LocationProvider>(
    session: &mut FeedSession<S, L>,
    query: String,
    tz: Tz,
) {
    println!("--- {} ---", query.trim());
    session.set_query(query);
    print_feed(session, tz);
}

async fn categories(config: &AppConfig, live: bool) -> Result<()> {
    let categories = if live {
        BackendClient::from_config(config)?
            .fetch_categories()
            .await
            .map_err(|err| anyhow::anyhow!("{}\n{err}", err.user_message()))?
    } else {
        load_snapshot().await?.categories
    };

    if categories.is_empty() {
        println!("No categories.");
    }
    for category in categories {
        println!("{}\t{}", category.id, category.name);
    }
    Ok(())
}

fn configure(store: &ConfigStore, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let mut shown = store.read();
            shown.api_key = shown.api_key.map(|key| mask(&key));
            shown.access_token = shown.access_token.map(|token| mask(&token));
            println!("{}", serde_json::to_string_pretty(&shown)?);
        }
        ConfigAction::Set { key, value } => {
            store.update(|config| config.set(&key, &value))?;
            println!("{key} updated");
        }
        ConfigAction::Path => println!("{}", store.path().display()),
    }
    Ok(())
}

fn mask(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    format!("{visible}…")
}

