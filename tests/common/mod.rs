//! Common test utilities - LabgateTest harness for end-to-end testing

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use labgate::{Config, Server};
use reqwest::Client;
use serde_json::Value;
use tokio::task::JoinHandle;

/// Test harness that spawns a real labgate server on a random port
pub struct LabgateTest {
    pub addr: SocketAddr,
    pub client: Client,
    server: Arc<Server>,
    _handle: JoinHandle<()>,
}

impl LabgateTest {
    /// Start a new test server instance
    pub async fn start() -> Result<Self> {
        Self::start_with(Config::default()).await
    }

    /// Start a server with the given config; the bind address is replaced
    /// with a free local port
    pub async fn start_with(mut config: Config) -> Result<Self> {
        // Find a random available port
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        drop(listener);

        config.bind_addr = addr;

        let server = Arc::new(Server::new(config));
        let server_clone = server.clone();

        // Spawn the server in a background task
        let handle = tokio::spawn(async move {
            if let Err(e) = server_clone.run().await {
                eprintln!("Server error: {}", e);
            }
        });

        // Wait for server to be ready
        let client = Client::builder().timeout(Duration::from_secs(5)).build()?;

        // Poll until server is ready (max 2 seconds)
        let mut ready = false;
        for _ in 0..20 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if client
                .get(format!("http://{}/health", addr))
                .send()
                .await
                .is_ok()
            {
                ready = true;
                break;
            }
        }

        if !ready {
            panic!("Server failed to start within 2 seconds");
        }

        Ok(Self {
            addr,
            client,
            server,
            _handle: handle,
        })
    }

    /// Get the base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .get(format!("{}{}", self.base_url(), path))
            .send()
            .await?)
    }

    /// Make a POST request with JSON body
    pub async fn post<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response> {
        Ok(self
            .client
            .post(format!("{}{}", self.base_url(), path))
            .json(body)
            .send()
            .await?)
    }

    /// POST and return the `allowed` field of the decision
    pub async fn decide(&self, path: &str, body: &Value) -> Result<bool> {
        let resp = self.post(path, body).await?;
        anyhow::ensure!(resp.status() == 200, "unexpected status {}", resp.status());
        let body: Value = resp.json().await?;
        body["allowed"]
            .as_bool()
            .ok_or_else(|| anyhow::anyhow!("no allowed field in {}", body))
    }

    /// Shutdown the server gracefully
    pub fn shutdown(&self) {
        self.server.shutdown();
    }
}

impl Drop for LabgateTest {
    fn drop(&mut self) {
        self.server.shutdown();
    }
}
