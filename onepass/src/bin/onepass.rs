//! OnePass demo.
//!
//! Issues and scans a pass, then runs a feed store over in-memory sources:
//! live snapshots, a like, a mode switch, a debounced search and a manual
//! refresh.

use anyhow::Context;
use onepass::config::Config;
use onepass::feed::{
    Event, FeedAction, FeedEnvironment, FeedMode, FeedReducer, FeedScope, FeedSources,
    FeedState, FeedStore, FeedSubscription, InMemoryEventSource, InMemoryLikesSource,
};
use onepass::pass::{self, Pass};
use onepass_core::environment::{Clock, SystemClock};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEMO_USER: &str = "demo-user";
const SETTLE: Duration = Duration::from_secs(15);
const HOUR: i64 = 3600;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_new(&config.log.filter)
                .unwrap_or_else(|_| "onepass=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    config.validate().context("invalid configuration")?;
    onepass::metrics::register_metrics();
    info!(?config, "Configuration loaded");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let now = clock.now_epoch_seconds();

    demo_pass(now)?;
    demo_feed(&config, clock, now).await?;

    info!("Demo finished");
    Ok(())
}

fn demo_pass(now: i64) -> anyhow::Result<()> {
    println!("=== Pass ===\n");

    let mut ticket = Pass::new(DEMO_USER, "key-2025-01", now, 1, "c2lnbmF0dXJlLWRlbW8")
        .context("demo pass should be complete")?;
    let token = ticket.to_qr_string().context("demo pass should encode")?;
    println!("QR token:  {token}");

    let scanned = pass::parse_from_qr(&token).context("demo token should decode")?;
    println!("Scanned:   uid={} kid={} complete={}", scanned.uid, scanned.kid, scanned.is_complete());

    ticket.record_scan(now);
    println!("Issued:    {}", ticket.issued_at_display());
    println!("Scanned:   {}", ticket.last_scanned_display());
    println!("Status:    {}", ticket.status());

    let tampered = token.replace(pass::QR_PREFIX, "badprefix:");
    if let Err(error) = pass::parse_from_qr(&tampered) {
        println!("Rejected:  {error}");
    }

    Ok(())
}

fn sample_events(now: i64) -> Vec<Event> {
    vec![
        Event::new("jazz-night", "Harbour Jazz Night")
            .with_tags(["music", "jazz"])
            .with_schedule(Some(now + 6 * HOUR), Some(now + 9 * HOUR))
            .created_at(now - 2 * 24 * HOUR)
            .at("Oslo"),
        Event::new("blues-cellar", "Blues in the Cellar")
            .with_tags(["music", "blues"])
            .with_schedule(Some(now + 3 * 24 * HOUR), None)
            .at("Bergen"),
        Event::new("tech-talk", "Rust Meetup")
            .with_tags(["tech"])
            .with_schedule(Some(now + 2 * HOUR), Some(now + 4 * HOUR))
            .created_at(now - HOUR)
            .at("Oslo"),
        Event::new("closing-market", "Night Market")
            .with_tags(["food"])
            .with_schedule(Some(now - 5 * HOUR), Some(now + HOUR))
            .at("Oslo"),
        Event::new("sold-out-gig", "Sold Out Gig")
            .with_tags(["music"])
            .sold_out(),
    ]
}

/// Wait until the store reduces an action matching `predicate`
async fn observe<F>(observed: &mut broadcast::Receiver<FeedAction>, predicate: F) -> anyhow::Result<()>
where
    F: Fn(&FeedAction) -> bool,
{
    tokio::time::timeout(SETTLE, async {
        loop {
            match observed.recv().await {
                Ok(action) if predicate(&action) => return Ok(()),
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {},
                Err(broadcast::error::RecvError::Closed) => {
                    anyhow::bail!("feed store closed");
                },
            }
        }
    })
    .await
    .context("feed did not update in time")?
}

async fn print_feed(store: &FeedStore, heading: &str) {
    let (mode, titles, error) = store
        .state(|s: &FeedState| {
            (
                s.mode,
                s.events.iter().map(|e| e.title.clone()).collect::<Vec<_>>(),
                s.error_message(),
            )
        })
        .await;

    println!("\n{heading} ({}):", mode.as_str());
    for (rank, title) in titles.iter().enumerate() {
        println!("  {}. {title}", rank + 1);
    }
    if let Some(error) = error {
        println!("  ! {error}");
    }
}

async fn demo_feed(config: &Config, clock: Arc<dyn Clock>, now: i64) -> anyhow::Result<()> {
    println!("\n=== Feed ===");

    let events = InMemoryEventSource::new(sample_events(now));
    let likes = InMemoryLikesSource::new();
    let sources = FeedSources::new(Arc::new(events.clone()), Arc::new(likes.clone()));

    let env = FeedEnvironment::new(clock, Arc::clone(&sources.events))
        .with_settings(config.feed.settings());
    let store = FeedStore::new(FeedState::default(), FeedReducer::new(), env);
    let mut observed = store.subscribe_actions();
    let subscription =
        FeedSubscription::spawn(store.clone(), &sources, FeedScope::Published, DEMO_USER);

    observe(&mut observed, |a| matches!(a, FeedAction::EventsSnapshot { .. })).await?;
    print_feed(&store, "Main feed").await;

    likes.like(DEMO_USER, "jazz-night");
    observe(&mut observed, |a| {
        matches!(a, FeedAction::LikesSnapshot { liked } if !liked.is_empty())
    })
    .await?;
    print_feed(&store, "Main feed after a like (not re-ranked)").await;

    store
        .send(FeedAction::SetMode {
            mode: FeedMode::Favorites,
        })
        .await?;
    print_feed(&store, "Favorites").await;

    store
        .send(FeedAction::SetMode {
            mode: FeedMode::MainFeed,
        })
        .await?;
    print_feed(&store, "Main feed re-ranked from likes").await;

    store
        .send(FeedAction::SearchChanged {
            query: "rust".to_string(),
        })
        .await?;
    store.wait_until_idle(SETTLE).await?;
    print_feed(&store, "Search \"rust\"").await;

    store
        .send(FeedAction::SearchChanged {
            query: String::new(),
        })
        .await?;
    store.send(FeedAction::Refresh).await?;
    store.wait_until_idle(SETTLE).await?;
    print_feed(&store, "After refresh").await;

    subscription.stop();
    store.shutdown();
    Ok(())
}
