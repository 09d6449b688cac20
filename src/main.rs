use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use epp_registry::config::Config;
use epp_registry::server::{tls_acceptor, Server};
use epp_registry::store::Store;
use epp_registry::{rdap, sweeper, whois, Error};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = run().await {
        error!("{err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Error> {
    let config = Config::parse();
    let _ = tokio_rustls::rustls::crypto::aws_lc_rs::default_provider().install_default();

    let store = Store::connect(&config.database_url).await?;
    if config.migrate {
        store.migrate().await?;
        info!("schema migrations applied");
    }

    let acceptor = match (&config.cert, &config.key) {
        (Some(cert), Some(key)) => {
            let acceptor = tls_acceptor(cert, key, config.ca.as_deref())?;
            info!("TLS enabled");
            Some(acceptor)
        }
        _ => {
            warn!("no certificate configured; serving plaintext (test mode only)");
            None
        }
    };

    let policy = config.policy();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(sweeper::run(
        store.clone(),
        policy.clone(),
        shutdown_rx.clone(),
    ));

    if let Some(addr) = config.whois_listen {
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "WHOIS listening");
        let store = store.clone();
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            if let Err(err) = whois::serve(listener, store, shutdown).await {
                error!(error = %err, "WHOIS server failed");
            }
        });
    }

    if let Some(addr) = config.rdap_listen {
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "RDAP listening");
        let store = store.clone();
        let policy = policy.clone();
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            if let Err(err) = rdap::serve(listener, store, policy, shutdown).await {
                error!(error = %err, "RDAP server failed");
            }
        });
    }

    let listener = TcpListener::bind(config.listen).await?;
    info!(addr = %config.listen, server_id = %config.server_id, "EPP listening");

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            let _ = shutdown_tx.send(true);
        }
    });

    let server = Arc::new(
        Server::new(store, policy)
            .idle_timeout(config.idle_timeout())
            .handshake_timeout(config.handshake_timeout()),
    );
    server.serve(listener, acceptor, shutdown_rx).await
}
