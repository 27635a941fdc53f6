//! zone-queue - Line-oriented driver console.
//!
//! Commands:
//!
//! ```text
//! view <stop-id>              watch a stop's queue
//! enter <stop-id>             join a stop's queue
//! exit <reason> [notes]       leave the current queue
//! change <stop-id> [notes]    move to another stop's queue
//! position                    re-resolve my position
//! stops                       list stops from the catalog
//! show                        render the current view
//! quit
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::RwLock;
use tracing_subscriber::EnvFilter;

use zone_queue::adapters::{HttpStopCatalog, InMemoryTokenStore, WebSocketConnector};
use zone_queue::application::{Notice, PrimaryAction, QueueSession, QueueUiState, QueueView};
use zone_queue::config::AppConfig;
use zone_queue::domain::foundation::StopId;
use zone_queue::domain::queue::{ActionOutcome, ExitReason, Stop};
use zone_queue::ports::{CatalogError, StopCatalog};
use zone_queue::QueueClient;

type StopNames = Arc<RwLock<HashMap<StopId, Stop>>>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.client.log_level))?;
    if config.client.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    config.validate()?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = ?config.client.environment,
        ws_url = %config.channel.ws_url,
        "zone-queue starting"
    );

    let tokens = Arc::new(InMemoryTokenStore::new());
    match config.session.token.clone() {
        Some(token) if config.session.has_token() => tokens.set(token).await,
        _ => tracing::warn!("no session token configured, staying offline"),
    }

    let catalog = HttpStopCatalog::new(
        config.api.base_url.clone(),
        config.api.timeout(),
        tokens.clone(),
    )?;
    let stops: StopNames = Arc::default();
    refresh_stops(&catalog, &stops).await;

    let connector = Arc::new(WebSocketConnector::new(config.channel.ws_url.clone()));
    let client = QueueClient::start(
        connector,
        tokens,
        config.channel.connection_settings(),
    )
    .await?;
    let session = client.session().clone();

    if let Some(driver) = session.driver() {
        println!("signed in as {}", driver.label());
    }

    let watcher = tokio::spawn(watch_changes(session.clone(), stops.clone()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    render(&session.view(), &*stops.read().await);
    while let Some(line) = lines.next_line().await? {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            continue;
        };
        let rest: Vec<&str> = words.collect();

        match command {
            "view" => match parse_stop(rest.first()) {
                Some(stop_id) => {
                    if !lookup_stop(&catalog, &stops, stop_id).await {
                        println!("! stop {} does not exist", stop_id);
                        continue;
                    }
                    if let Err(e) = session.view_stop(stop_id).await {
                        println!("! could not load stop {}: {}", stop_id, e);
                    }
                }
                None => println!("usage: view <stop-id>"),
            },
            "enter" => match parse_stop(rest.first()) {
                Some(stop_id) => report(session.enter(stop_id).await),
                None => println!("usage: enter <stop-id>"),
            },
            "exit" => match rest.first().map(|r| r.parse::<ExitReason>()) {
                Some(Ok(reason)) => report(session.exit(reason, notes(&rest[1..])).await),
                Some(Err(e)) => println!("! {}", e),
                None => println!("usage: exit <service_taken|shift_end|emergency|...> [notes]"),
            },
            "change" => match parse_stop(rest.first()) {
                Some(stop_id) => {
                    report(session.change_stop(stop_id, notes(&rest[1..])).await)
                }
                None => println!("usage: change <stop-id> [notes]"),
            },
            "position" => {
                if let Err(e) = session.refresh_position().await {
                    println!("! {}", e);
                }
            }
            "stops" => {
                refresh_stops(&catalog, &stops).await;
                let mut listed: Vec<Stop> = stops.read().await.values().cloned().collect();
                listed.sort_by_key(|s| s.id);
                for stop in listed {
                    println!("  {:>4}  {}  ({:?})", stop.id.value(), stop.name, stop.status);
                }
                continue;
            }
            "show" => {}
            "quit" | "q" => break,
            other => {
                println!("unknown command: {}", other);
                continue;
            }
        }
        render(&session.view(), &*stops.read().await);
    }

    watcher.abort();
    client.shutdown().await;
    Ok(())
}

/// Prints channel notices and re-renders on connection, roster, position
/// or busy changes. Rejected actions are already reported inline.
async fn watch_changes(session: Arc<QueueSession>, stops: StopNames) {
    let mut notices = session.notices();
    let mut status = session.watch_connection();
    let mut roster = session.subscriptions().watch();
    let mut position = session.position().watch();
    let mut busy = session.watch_busy();

    loop {
        tokio::select! {
            notice = notices.recv() => match notice {
                Ok(Notice::ActionRejected { .. }) => continue,
                Ok(notice) => println!("! {}", notice.text()),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(_) => break,
            },
            changed = status.changed() => if changed.is_err() { break },
            changed = roster.changed() => if changed.is_err() { break },
            changed = position.changed() => if changed.is_err() { break },
            changed = busy.changed() => if changed.is_err() { break },
        }
        render(&session.view(), &*stops.read().await);
    }
}

async fn refresh_stops(catalog: &HttpStopCatalog, stops: &StopNames) {
    match catalog.list_stops().await {
        Ok(listed) => {
            let mut names = stops.write().await;
            names.clear();
            names.extend(listed.into_iter().map(|s| (s.id, s)));
        }
        Err(e) => tracing::warn!(error = %e, "stop catalog unavailable"),
    }
}

/// Makes sure `id` has a name before it is viewed. Returns false only when
/// the catalog says the stop does not exist; other failures fall back to
/// the bare id.
async fn lookup_stop(catalog: &HttpStopCatalog, stops: &StopNames, id: StopId) -> bool {
    if stops.read().await.contains_key(&id) {
        return true;
    }
    match catalog.get_stop(id).await {
        Ok(stop) => {
            stops.write().await.insert(id, stop);
            true
        }
        Err(CatalogError::NotFound(_)) => false,
        Err(e) => {
            tracing::warn!(stop_id = %id, error = %e, "stop lookup failed");
            true
        }
    }
}

fn parse_stop(word: Option<&&str>) -> Option<StopId> {
    word?.parse().ok()
}

fn notes(words: &[&str]) -> Option<String> {
    let joined = words.join(" ");
    (!joined.is_empty()).then_some(joined)
}

fn report(outcome: ActionOutcome) {
    match outcome.display_message() {
        Some(message) if !outcome.success => println!("! {}", message),
        Some(message) => println!("ok: {}", message),
        None => println!("ok"),
    }
}

fn stop_label(id: StopId, stops: &HashMap<StopId, Stop>) -> String {
    match stops.get(&id) {
        Some(stop) => format!("{} (#{})", stop.name, id),
        None => format!("stop #{}", id),
    }
}

fn render(view: &QueueView, stops: &HashMap<StopId, Stop>) {
    println!();
    match view.viewed_stop {
        Some(id) => println!("== {} ==", stop_label(id, stops)),
        None => println!("== no stop selected (view <stop-id>) =="),
    }

    match view.state {
        QueueUiState::Connecting => match &view.last_error {
            Some(error) => println!("connecting... (last error: {})", error),
            None => println!("connecting..."),
        },
        QueueUiState::CanEnter => println!("you are not in a queue"),
        QueueUiState::InQueueHere | QueueUiState::InQueueElsewhere => {
            let position = &view.my_position;
            let at = position
                .stop
                .as_ref()
                .map_or_else(|| "?".to_string(), |s| s.name.clone());
            println!(
                "you are #{} of {} at {}",
                position.position.unwrap_or_default(),
                position.total_in_queue.unwrap_or_default(),
                at
            );
        }
    }

    match &view.rows {
        Some(rows) if rows.is_empty() => println!("  (queue is empty)"),
        Some(rows) => {
            for row in rows {
                let marker = if row.is_mine { '>' } else { ' ' };
                println!(
                    "{} {:>3}. {:<24} {:<16} since {} ({})",
                    marker,
                    row.entry.position,
                    row.entry.driver.full_name(),
                    row.entry.vehicle.label(),
                    row.entry.entry_time.clock_label(),
                    row.entry.wait_label(),
                );
            }
            println!("  {} vehicle(s)", view.total_vehicles);
        }
        None if view.viewed_stop.is_some() => println!("  loading..."),
        None => {}
    }

    if let Some(button) = view.primary_action {
        let label = match button.action {
            PrimaryAction::Enter(id) => format!("enter {}", id),
            PrimaryAction::Exit => "exit <reason> [notes]".to_string(),
            PrimaryAction::ChangeStop(id) => format!("change {} [notes]", id),
        };
        if button.enabled {
            println!("-> {}", label);
        } else {
            println!("-> {} (busy)", label);
        }
    }
}
