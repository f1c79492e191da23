//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use procyon::application::ApplicationBuilder;
use procyon::config::ConfigResolver;
use procyon::lifecycle::Shutdown;
use procyon::{Application, ApplicationContext, Context};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Builder with file loading, logging and signal handling switched off.
pub fn quiet_builder() -> ApplicationBuilder {
    Application::builder()
        .name("procyon-test")
        .config_resolver(ConfigResolver::new().with_locations(["./does-not-exist"]))
        .with_system_environment(false)
        .with_logging(false)
        .with_signal_handling(false)
}

/// A started application listening on an ephemeral port.
pub struct RunningApp {
    pub addr: SocketAddr,
    pub shutdown: Arc<Shutdown>,
    pub handle: JoinHandle<Result<(), procyon::ApplicationError>>,
}

impl RunningApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Trigger shutdown and wait for the server task to finish.
    pub async fn stop(self) {
        self.shutdown.trigger();
        let result = tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("server did not stop in time")
            .expect("server task panicked");
        result.expect("server returned an error");
    }
}

/// Serve a refreshed application on `127.0.0.1:0`.
pub async fn start(app: ApplicationContext) -> RunningApp {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Arc::clone(app.shutdown());
    let handle = tokio::spawn(async move {
        let ctx = Context::background();
        app.start(&ctx, listener).await
    });
    RunningApp {
        addr,
        shutdown,
        handle,
    }
}
