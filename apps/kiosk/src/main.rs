use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use device_session::{
    resolve_endpoint, Announcer, DeviceSession, GestureRouter, RetryPolicy, SessionEvent,
    SessionStatus, WebSocketTransport,
};

mod selection;

use selection::{KioskHost, SpeechLog};

#[derive(Parser, Debug)]
struct Args {
    /// Recommender server origin, e.g. http://127.0.0.1:8787
    #[arg(long, default_value = "http://127.0.0.1:8787")]
    server_url: String,
    /// Explicit device endpoint; overrides derivation from the server origin.
    #[arg(long)]
    device_endpoint: Option<String>,
    #[arg(long, default_value_t = 0)]
    mood: i32,
    #[arg(long, default_value_t = 3)]
    energy: i32,
    #[arg(long, default_value = "evening")]
    time_of_day: String,
    #[arg(long, default_value = "")]
    place: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();

    let host = KioskHost::new(args.server_url.clone(), args.mood, args.energy);
    host.fetch_recommendations(&args.time_of_day, &args.place)
        .await?;

    let endpoint = resolve_endpoint(args.device_endpoint.as_deref(), &args.server_url)?;
    let session = DeviceSession::new(
        Arc::new(WebSocketTransport),
        host.clone(),
        RetryPolicy::default(),
        endpoint,
    );
    host.attach_session(&session);

    let announcer = Arc::new(SpeechLog);
    let router = GestureRouter::new(session.clone(), host.clone(), announcer.clone());
    let _router_task = router.spawn(&session);

    // Connection badge: every status transition becomes a log line, and a
    // fresh connection is announced out loud.
    let mut events = session.subscribe();
    let badge_announcer = announcer.clone();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let SessionEvent::StatusChanged(status) = event {
                info!(status = status.as_str(), "device status");
                if status == SessionStatus::Connected {
                    badge_announcer.announce("Device connected. Tilt to browse tasks.");
                }
            }
        }
    });

    session.connect().await;
    info!(endpoint = session.endpoint(), "kiosk running, ctrl-c to stop");
    tokio::signal::ctrl_c().await?;
    session.disconnect().await;
    Ok(())
}
