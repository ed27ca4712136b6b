//! Listener supervision
//!
//! Each listener runs in its own task. A bind or serve failure ends only that
//! listener; the supervisor joins all of them once shutdown is signalled.

use anyhow::Context;
use axum::Router;
use std::net::SocketAddr;
use tokio::sync::watch;
use tracing::{error, info};

pub struct Listener {
    pub name: &'static str,
    pub addr: String,
    pub router: Router,
}

impl Listener {
    pub fn new(name: &'static str, addr: impl Into<String>, router: Router) -> Self {
        Self {
            name,
            addr: addr.into(),
            router,
        }
    }
}

/// Bind and serve one listener until `shutdown` flips to true
pub async fn serve(listener: Listener, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
    let tcp = tokio::net::TcpListener::bind(&listener.addr)
        .await
        .with_context(|| format!("failed to bind {} listener on {}", listener.name, listener.addr))?;
    info!(listener = listener.name, "🚀 listening on http://{}", listener.addr);

    axum::serve(
        tcp,
        listener
            .router
            .into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        // A dropped sender also ends the listener
        let _ = shutdown.wait_for(|stop| *stop).await;
    })
    .await
    .with_context(|| format!("{} listener failed", listener.name))
}

/// Run every listener in its own task and wait for all of them to finish
pub async fn supervise(
    listeners: Vec<Listener>,
    shutdown: watch::Receiver<bool>,
) -> Vec<(&'static str, anyhow::Result<()>)> {
    let handles: Vec<_> = listeners
        .into_iter()
        .map(|listener| {
            let name = listener.name;
            (name, tokio::spawn(serve(listener, shutdown.clone())))
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for (name, handle) in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(join_err) => Err(anyhow::anyhow!("{name} listener task panicked: {join_err}")),
        };
        match &result {
            Ok(()) => info!(listener = name, "listener stopped"),
            Err(err) => error!(listener = name, error = %format!("{err:#}"), "listener failed"),
        }
        results.push((name, result));
    }
    results
}
