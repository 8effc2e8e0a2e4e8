//! vodsync - keeps media server metadata in sync with a video archive service
//!
//! Entry point and operational command surface. `serve` starts the
//! notification listener with the periodic sync job; every other command
//! performs one operation and exits.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vodsync::AppState;
use vodsync::cli::Command;
use vodsync::config::Config;
use vodsync::services::archive::ArchiveClient;
use vodsync::services::media::MediaClient;
use vodsync::services::retry::RetryConfig;
use vodsync::sync::SyncService;
use vodsync::sync::scheduler::SyncScheduler;
use vodsync::{api, jobs};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let command = Command::from_args();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vodsync=info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::from_env()?);

    let http = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("Failed to create HTTP client")?;
    let retry = RetryConfig::default();
    let archive = Arc::new(ArchiveClient::new(
        &config.archive_url,
        &config.archive_token,
        http.clone(),
        retry.clone(),
    ));
    let media = Arc::new(MediaClient::new(
        &config.media_url,
        &config.media_api_key,
        http.clone(),
        retry,
    ));
    let sync = Arc::new(SyncService::new(
        archive.clone(),
        media.clone(),
        config.media_library.clone(),
    ));

    match command {
        Command::Serve => serve(config, archive, media, sync).await,
        Command::RunOnce => run_once(&sync).await,
        Command::Health => health(&config, &archive, &media).await,
        Command::Stats => stats(&config, &archive, &media).await,
        Command::CleanOrphans => clean_orphans(&sync).await,
        Command::TestNotification => test_notification(&config, &http).await,
        Command::RefreshLibrary => refresh_library(&config, &media).await,
    }
}

/// Run the notification listener, periodic sync job and health/stats API.
async fn serve(
    config: Arc<Config>,
    archive: Arc<ArchiveClient>,
    media: Arc<MediaClient>,
    sync: Arc<SyncService>,
) -> Result<()> {
    tracing::info!("Starting vodsync server");

    let runner_sync = sync.clone();
    let scheduler = SyncScheduler::spawn(move || {
        let sync = runner_sync.clone();
        async move {
            if let Err(err) = sync.run().await {
                tracing::error!(error = %err, "sync run failed");
            }
        }
    });

    let _jobs = jobs::start_scheduler(scheduler.clone(), config.sync_interval()).await?;

    let state = AppState {
        config: config.clone(),
        archive,
        media,
        sync,
        scheduler,
    };
    let app = api::create_router(state).layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.listen_port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Perform a single synchronization pass and print the report
async fn run_once(sync: &SyncService) -> Result<()> {
    let report = sync.run().await?;
    println!("{}", serde_json::to_string_pretty(report.as_ref())?);
    Ok(())
}

/// Check both remote services and the media path
async fn health(config: &Config, archive: &ArchiveClient, media: &MediaClient) -> Result<()> {
    let (archive_result, media_result) = tokio::join!(archive.ping(), media.ping());
    let mut healthy = true;

    match archive_result {
        Ok(()) => println!("archive: up"),
        Err(err) => {
            healthy = false;
            println!("archive: down ({err})");
        }
    }
    match media_result {
        Ok(()) => println!("media: up"),
        Err(err) => {
            healthy = false;
            println!("media: down ({err})");
        }
    }

    if std::path::Path::new(&config.media_path_prefix).exists() {
        println!("media path: accessible");
    } else {
        healthy = false;
        println!("media path: not accessible ({})", config.media_path_prefix);
    }

    if healthy {
        println!("health: ok");
        Ok(())
    } else {
        println!("health: degraded");
        std::process::exit(1);
    }
}

/// Print live counts from both remote services
async fn stats(config: &Config, archive: &ArchiveClient, media: &MediaClient) -> Result<()> {
    let (total_videos, channels, library) = tokio::join!(
        archive.total_videos(),
        archive.channels(),
        media.find_library_root(&config.media_library)
    );

    println!("archive videos: {}", total_videos?);
    println!("archive channels: {}", channels?.len());

    let library_id = library?;
    let item_count = media.item_count(&library_id).await?;
    println!("media items: {item_count}");

    Ok(())
}

/// List media items with no counterpart in the archive
async fn clean_orphans(sync: &SyncService) -> Result<()> {
    let orphans = sync.find_orphans().await?;
    if orphans.is_empty() {
        println!("no orphaned items found");
        return Ok(());
    }

    println!("{} orphaned items:", orphans.len());
    for orphan in &orphans {
        println!(
            "  {} '{}' external_id={} path={}",
            orphan.item_id,
            orphan.title,
            orphan.external_id.as_deref().unwrap_or("-"),
            orphan.path.as_deref().unwrap_or("-"),
        );
    }
    println!("note: deletion requires additional API permissions; items are listed only");
    Ok(())
}

/// Exercise the local notification endpoint of a running server
async fn test_notification(config: &Config, http: &reqwest::Client) -> Result<()> {
    let base = format!("http://localhost:{}", config.listen_port);

    let healthz = http
        .get(format!("{base}/healthz"))
        .send()
        .await
        .context("healthz request failed - is the server running?")?;
    println!("GET /healthz: {}", healthz.status());

    let notify = http
        .post(format!("{base}/notify"))
        .json(&serde_json::json!({ "message": "test notification" }))
        .send()
        .await
        .context("notify request failed")?;
    println!("POST /notify: {}", notify.status());

    if healthz.status().is_success() && notify.status().is_success() {
        Ok(())
    } else {
        std::process::exit(1);
    }
}

/// Trigger a media-server rescan of the target library
async fn refresh_library(config: &Config, media: &MediaClient) -> Result<()> {
    let library_id = media.find_library_root(&config.media_library).await?;
    media.refresh_library(&library_id).await?;
    println!("library refresh triggered: {}", config.media_library);
    Ok(())
}
