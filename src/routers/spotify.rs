// Spotify OAuth redirect listener
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::{Query, State},
    routing::get,
};
use tokio::{
    net::TcpListener,
    sync::{Mutex, oneshot},
    task::JoinHandle,
};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use url::Url;

use crate::{controllers::spotify::AuthCallbackQuery, error::SpotifyError};

type CallbackSender = Arc<Mutex<Option<oneshot::Sender<AuthCallbackQuery>>>>;

pub fn spotify_routes(callback_path: &str, sender: CallbackSender) -> Router {
    Router::new()
        .route(callback_path, get(spotify_callback_route))
        .layer(TraceLayer::new_for_http())
        .with_state(sender)
}

/// GET <redirect path> - OAuth callback handler, accepts one redirect
async fn spotify_callback_route(
    State(sender): State<CallbackSender>,
    Query(params): Query<AuthCallbackQuery>,
) -> &'static str {
    match sender.lock().await.take() {
        Some(tx) => {
            let _ = tx.send(params);
            "Spotted on Spotify received your authorization. You can close this tab and return to the terminal."
        }
        None => "Authorization was already received. You can close this tab.",
    }
}

/// One-shot HTTP listener on the host and port of a loopback redirect URI.
pub struct CallbackListener {
    addr: SocketAddr,
    received: oneshot::Receiver<AuthCallbackQuery>,
    shutdown: oneshot::Sender<()>,
    server: JoinHandle<()>,
}

impl CallbackListener {
    pub async fn bind(redirect_uri: &Url) -> Result<Self, SpotifyError> {
        let host = redirect_uri
            .host_str()
            .ok_or_else(|| SpotifyError::Auth(format!("redirect URI {} has no host", redirect_uri)))?;
        let port = redirect_uri.port_or_known_default().unwrap_or(80);
        let bind_to = format!("{}:{}", host, port);

        let listener = TcpListener::bind(&bind_to)
            .await
            .map_err(|e| SpotifyError::Auth(format!("Failed to listen on {}: {}", bind_to, e)))?;
        let addr = listener
            .local_addr()
            .map_err(|e| SpotifyError::Auth(e.to_string()))?;

        let (tx, received) = oneshot::channel();
        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let app = spotify_routes(redirect_uri.path(), Arc::new(Mutex::new(Some(tx))));

        let server = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = serve.await {
                error!("Callback listener failed: {}", e);
            }
        });

        info!("Waiting for Spotify redirect on {}", addr);
        Ok(Self {
            addr,
            received,
            shutdown,
            server,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Wait for the redirect, then stop listening.
    pub async fn wait(self, timeout: Duration) -> Result<AuthCallbackQuery, SpotifyError> {
        let Self {
            received,
            shutdown,
            mut server,
            ..
        } = self;

        let result = tokio::time::timeout(timeout, received).await;

        let _ = shutdown.send(());
        if tokio::time::timeout(Duration::from_secs(2), &mut server)
            .await
            .is_err()
        {
            server.abort();
        }

        match result {
            Ok(Ok(params)) => Ok(params),
            Ok(Err(_)) => Err(SpotifyError::Auth("callback listener stopped".to_string())),
            Err(_) => Err(SpotifyError::Auth(format!(
                "no authorization received within {}s",
                timeout.as_secs()
            ))),
        }
    }
}
