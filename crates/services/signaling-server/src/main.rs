//! Signaling server binary entry point
//!
//! Accepts WebSocket signaling clients, negotiates one WebRTC peer connection
//! per client and reports connect/disconnect transitions to a local process.
//!
//! # Usage
//!
//! ```bash
//! # Listen on the default address (0.0.0.0:8080) with Google STUN servers
//! cargo run -p screenlink-server
//!
//! # Notify a local consumer over a Unix socket, LAN only
//! cargo run -p screenlink-server -- \
//!   --listen 127.0.0.1:9000 \
//!   --pipe-name /tmp/screenlink.sock \
//!   --no-google-stun
//! ```

use clap::Parser;
use screenlink_signaling::{
    LoggingRenderSink, PipeNotifier, SharedState, SignalingConfig, SignalingServer,
    WebRtcConnector,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Screenlink signaling server
///
/// WebSocket signaling for screen capture viewers.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address the WebSocket listener binds to
    #[arg(long, default_value = "0.0.0.0:8080", env = "SCREENLINK_LISTEN")]
    listen: String,

    /// Do not offer the public Google STUN servers to peer connections
    #[arg(long, env = "SCREENLINK_NO_GOOGLE_STUN")]
    no_google_stun: bool,

    /// Local endpoint notified on connect/disconnect
    /// (Unix socket path, or `\\.\pipe\name` on Windows)
    #[arg(long, env = "SCREENLINK_PIPE_NAME")]
    pipe_name: Option<String>,

    /// Heartbeat ping interval after `register`, in seconds
    #[arg(long, default_value_t = 30, env = "SCREENLINK_HEARTBEAT_SECS")]
    heartbeat_secs: u64,

    /// Label of the data channel opened on every peer connection
    #[arg(long, default_value = "testdatachannel", env = "SCREENLINK_DATA_CHANNEL_LABEL")]
    data_channel_label: String,
}

impl Args {
    fn to_config(&self) -> SignalingConfig {
        SignalingConfig {
            listen_addr: self.listen.clone(),
            use_stun: !self.no_google_stun,
            notify_endpoint: self.pipe_name.clone(),
            heartbeat_interval_secs: self.heartbeat_secs,
            data_channel_label: self.data_channel_label.clone(),
            ..Default::default()
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Set up Ctrl+C handler at the very start
    let shutdown_flag = Arc::new(AtomicBool::new(false));
    let shutdown_flag_handler = Arc::clone(&shutdown_flag);

    ctrlc::set_handler(move || {
        let was_already_set = shutdown_flag_handler.swap(true, Ordering::SeqCst);
        if was_already_set {
            eprintln!("Shutdown already in progress, forcing immediate exit");
            std::process::exit(0);
        }
        eprintln!("\nCtrl+C received, shutting down...");

        std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_secs(3));
            eprintln!("Graceful shutdown timeout (3s), forcing exit");
            std::process::exit(0);
        });
    })?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(num_cpus::get())
        .thread_name("screenlink-worker")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(args, shutdown_flag))
}

async fn async_main(
    args: Args,
    shutdown_flag: Arc<AtomicBool>,
) -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = args.to_config();
    config.validate()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %config.listen_addr,
        use_stun = config.use_stun,
        notify_endpoint = ?config.notify_endpoint,
        heartbeat_secs = config.heartbeat_interval_secs,
        "Screenlink signaling server starting"
    );

    let config = Arc::new(config);
    let state = Arc::new(SharedState::new(
        Arc::clone(&config),
        Arc::new(WebRtcConnector::new(Arc::new(LoggingRenderSink))),
        Arc::new(PipeNotifier::from_config(&config)),
    ));

    let handle = SignalingServer::bind(state).await?.start();
    info!("Listening on ws://{}", handle.local_addr());

    while !shutdown_flag.load(Ordering::SeqCst) {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }

    info!("Shutdown signal received, stopping signaling server...");
    handle.shutdown().await?;
    info!("Signaling server shut down gracefully");

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
