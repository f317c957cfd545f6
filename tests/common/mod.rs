//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use timevault_guard::config::GuardConfig;
use timevault_guard::{GuardServer, SecurityManager, Shutdown};

/// A gateway running on an ephemeral local port.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub client: reqwest::Client,
    shutdown: Shutdown,
    handle: JoinHandle<()>,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Trigger shutdown and wait for the server task to finish.
    pub async fn stop(self) {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("gateway did not shut down in time")
            .expect("gateway task panicked");
    }
}

/// Start a gateway with `config`; the environment is ignored.
pub async fn start_gateway(config: GuardConfig) -> TestGateway {
    let manager = SecurityManager::from_config(config.security.clone(), |_| None).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = GuardServer::new(config, Arc::new(manager));
    let server_shutdown = shutdown.clone();
    let handle = tokio::spawn(async move {
        server.run(listener, server_shutdown).await.unwrap();
    });

    TestGateway {
        addr,
        client: reqwest::Client::new(),
        shutdown,
        handle,
    }
}

/// Start a gateway with the built-in configuration.
#[allow(dead_code)]
pub async fn start_default_gateway() -> TestGateway {
    start_gateway(GuardConfig::default()).await
}
