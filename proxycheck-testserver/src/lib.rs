use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

pub mod mock_proxy;
pub mod upstream;

pub use mock_proxy::{
    BreakerOptions, BreakerSnapshot, CircuitState, MockProxy, MockProxyOptions, MockProxyStats,
    RateLimitOptions,
};
pub use upstream::{Upstream, UpstreamOptions, UpstreamReply, upstream_router};

/// A spawned axum server with graceful shutdown.
pub(crate) struct ServerHandle {
    pub(crate) base_url: String,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

pub(crate) async fn spawn_server(bind: &str, app: Router) -> std::io::Result<ServerHandle> {
    let listener = TcpListener::bind(bind).await?;
    let addr = listener.local_addr()?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });
        let _ = serve.await;
    });

    Ok(ServerHandle {
        base_url: format!("http://{addr}"),
        shutdown_tx: Some(shutdown_tx),
        task: Some(task),
    })
}

impl ServerHandle {
    pub(crate) async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if self.shutdown_tx.is_some()
            && let Some(task) = self.task.take()
        {
            task.abort();
        }
    }
}

/// The stub upstream served on its own port.
pub struct TestServer {
    handle: ServerHandle,
    upstream: Upstream,
}

impl TestServer {
    pub async fn start() -> std::io::Result<Self> {
        Self::start_with(UpstreamOptions::default()).await
    }

    pub async fn start_with(options: UpstreamOptions) -> std::io::Result<Self> {
        Self::bind("127.0.0.1:0", options).await
    }

    pub async fn bind(addr: &str, options: UpstreamOptions) -> std::io::Result<Self> {
        let upstream = Upstream::new(options);
        let handle = spawn_server(addr, upstream_router(upstream.clone())).await?;
        Ok(Self { handle, upstream })
    }

    pub fn base_url(&self) -> &str {
        &self.handle.base_url
    }

    pub fn upstream(&self) -> &Upstream {
        &self.upstream
    }

    pub async fn shutdown(self) {
        self.handle.shutdown().await;
    }
}
