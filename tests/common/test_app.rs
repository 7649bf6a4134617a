use std::net::SocketAddr;
use std::sync::Arc;

use mcp_inspector::app_context::AppContext;
use mcp_inspector::config::AppConfig;
use mcp_inspector::server::build_app;
use tokio::net::TcpListener;

/// A gateway instance bound to an ephemeral port, sharing its context with
/// the test so registries can be inspected directly.
pub struct TestApp {
    pub addr: SocketAddr,
    pub ctx: Arc<AppContext>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(AppConfig::default()).await
    }

    pub async fn spawn_with(config: AppConfig) -> Self {
        let ctx = Arc::new(AppContext::new(config).expect("Failed to create AppContext in test"));
        let app = build_app(Arc::clone(&ctx));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;

        Self {
            addr,
            ctx,
            handle: Some(handle),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
