pub mod auth;
pub mod error;
pub mod extract;
pub mod handlers;

use std::net::SocketAddr;

use axum::middleware;
use axum::routing::get;
use axum::Router;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};

pub use auth::Credentials;
pub use error::ApiError;
pub use handlers::ApiState;

use handlers::{actual_lrps, cells, desired_lrps};

/// Router-level switches taken from the `[server]` config section.
#[derive(Debug, Clone, Default)]
pub struct ServerOptions {
    pub credentials: Option<Credentials>,
    pub cors_enabled: bool,
}

pub fn router(state: ApiState, options: &ServerOptions) -> Router {
    let mut app = Router::new()
        .route(
            "/v1/desired_lrps",
            get(desired_lrps::list).post(desired_lrps::create),
        )
        .route(
            "/v1/desired_lrps/",
            get(desired_lrps::get_without_guid)
                .put(desired_lrps::update_without_guid)
                .delete(desired_lrps::delete_without_guid),
        )
        .route(
            "/v1/desired_lrps/{process_guid}",
            get(desired_lrps::get)
                .put(desired_lrps::update)
                .delete(desired_lrps::delete),
        )
        .route("/v1/actual_lrps", get(actual_lrps::list))
        .route(
            "/v1/actual_lrps/{process_guid}",
            get(actual_lrps::list_by_process_guid),
        )
        .route("/v1/cells", get(cells::list))
        .with_state(state);

    if let Some(credentials) = options.credentials.clone() {
        app = app.layer(middleware::from_fn_with_state(
            credentials,
            auth::require_basic_auth,
        ));
    }
    if options.cors_enabled {
        app = app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }
    app
}

/// Serve `app` on `addr` until the shutdown signal fires.
pub async fn serve(
    app: Router,
    addr: SocketAddr,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "API listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;
    Ok(())
}
