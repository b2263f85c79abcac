use anyhow::{Context, Result};
use axum::{
    extract::State,
    response::Redirect,
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::info;

pub struct AppState {
    /// URL path of the generated page, e.g. "/food_map.html".
    pub index: String,
}

pub fn router(html: &Path) -> Result<Router> {
    let file_name = html.file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Output path has no file name: {:?}", html))?;
    let dir = match html.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => Path::new(".").to_path_buf(),
    };

    let state = Arc::new(AppState {
        index: format!("/{}", file_name),
    });

    Ok(Router::new()
        .route("/", get(index_handler))
        .fallback_service(ServeDir::new(dir))
        .layer(CorsLayer::permissive())
        .with_state(state))
}

pub async fn start_server(html: &Path, port: u16, on_ready: impl FnOnce(&str)) -> Result<()> {
    let app = router(html)?;
    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    let listener = tokio::net::TcpListener::bind(addr).await
        .with_context(|| format!("Failed to bind {}", addr))?;
    let url = format!("http://{}/", addr);
    info!(%url, "Serving map");
    on_ready(&url);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn index_handler(State(state): State<Arc<AppState>>) -> Redirect {
    Redirect::temporary(&state.index)
}
