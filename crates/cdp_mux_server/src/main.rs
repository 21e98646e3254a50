mod session;

use std::sync::Arc;

use anyhow::Context;
use cdp_mux_core::backend::DeviceDiscovery;
use cdp_mux_core::prelude::{default_prelude, load_prelude};
use cdp_mux_core::{MuxConfig, RootTranslator};
use tokio::net::TcpListener;

use crate::session::{Session, SessionContext};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = MuxConfig::from_env();
    let prelude = match &config.prelude_path {
        Some(path) => load_prelude(path)
            .await
            .with_context(|| format!("loading prelude from {}", path.display()))?,
        None => default_prelude(),
    };
    let translator = RootTranslator::from_config(&config).context("configuring path roots")?;
    let discovery = DeviceDiscovery::new(&config).context("building discovery client")?;

    let context = SessionContext {
        discovery: Arc::new(discovery),
        translator: Arc::new(translator),
        prelude,
        poll_interval: config.poll_interval,
    };

    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(
        "Starting CDP Mux on ws://{} (devices from {})",
        config.listen_addr,
        config.discovery_endpoint
    );

    // One front-end at a time; the next client is accepted once the current one leaves.
    loop {
        let (stream, peer) = listener.accept().await?;
        let socket = match tokio_tungstenite::accept_async(stream).await {
            Ok(socket) => socket,
            Err(e) => {
                tracing::warn!("WebSocket handshake with {} failed: {}", peer, e);
                continue;
            }
        };

        tracing::info!("Client connected: {}", peer);
        Session::new(&context).run(socket).await;
        tracing::info!("Client disconnected: {}", peer);
    }
}
