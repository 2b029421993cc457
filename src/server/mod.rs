//! Development server with live reload

use anyhow::Result;
use axum::{
    body::Body,
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::{Request, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use notify_debouncer_mini::{new_debouncer, notify::RecursiveMode};
use percent_encoding::percent_decode_str;
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tower_http::services::ServeDir;

use crate::Site;

/// Reload client injected into served HTML pages. Reloading on close
/// doubles as the reconnect path when the server restarts.
const LIVE_RELOAD_SCRIPT: &str = r#"
<script>
(() => {
  const sock = new WebSocket(`ws://${location.host}/__livereload`);
  sock.onmessage = (ev) => { if (ev.data === 'reload') location.reload(); };
  sock.onclose = () => setTimeout(() => location.reload(), 2000);
})();
</script>
</body>
"#;

/// Shared handler state: where the built site lives and the channel that
/// fans reload notices out to connected sockets.
struct ServerState {
    public_dir: PathBuf,
    reload_tx: broadcast::Sender<()>,
}

/// Start the development server. Watches the source tree, the config
/// file, and the template directory; every change rebuilds the site and
/// reloads connected browsers.
pub async fn start(site: &Site, ip: &str, port: u16, open: bool) -> Result<()> {
    let (reload_tx, _) = broadcast::channel::<()>(16);

    let state = Arc::new(ServerState {
        public_dir: site.public_dir.clone(),
        reload_tx: reload_tx.clone(),
    });

    let app = Router::new()
        .route("/__livereload", get(livereload_handler))
        .fallback(fallback_handler)
        .with_state(state);

    let bind_ip = if ip == "localhost" { "127.0.0.1" } else { ip };
    let addr: SocketAddr = format!("{}:{}", bind_ip, port).parse()?;

    let url = format!("http://{}:{}", ip, port);
    println!("Serving {} at {}", site.public_dir.display(), url);
    println!("Watching for changes. Press Ctrl+C to stop.");

    if open {
        if let Err(e) = open_browser(&url) {
            tracing::warn!("Failed to open browser: {}", e);
        }
    }

    let watch_site = site.clone();
    tokio::spawn(async move {
        if let Err(e) = watch_and_rebuild(watch_site, reload_tx).await {
            tracing::error!("file watcher stopped: {}", e);
        }
    });

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Watch for file changes, rebuild, and notify clients. A rebuild failure
/// is logged and the previous output stays served.
async fn watch_and_rebuild(site: Site, reload_tx: broadcast::Sender<()>) -> Result<()> {
    let (tx, rx) = std::sync::mpsc::channel();

    // Debounce so one save triggers one rebuild
    let mut debouncer = new_debouncer(Duration::from_millis(500), tx)?;

    if site.source_dir.exists() {
        debouncer
            .watcher()
            .watch(&site.source_dir, RecursiveMode::Recursive)?;
        tracing::debug!("Watching: {:?}", site.source_dir);
    }

    if let Some(template_dir) = &site.template_dir {
        if template_dir.exists() {
            debouncer
                .watcher()
                .watch(template_dir, RecursiveMode::Recursive)?;
            tracing::debug!("Watching: {:?}", template_dir);
        }
    }

    let config_path = site.base_dir.join("_config.yml");
    if config_path.exists() {
        debouncer
            .watcher()
            .watch(&config_path, RecursiveMode::NonRecursive)?;
        tracing::debug!("Watching: {:?}", config_path);
    }

    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                let relevant: Vec<_> = events
                    .iter()
                    .filter(|e| !is_noise(e.path.strip_prefix(&site.base_dir).unwrap_or(&e.path)))
                    .collect();

                if relevant.is_empty() {
                    continue;
                }

                for event in &relevant {
                    tracing::info!("changed: {}", event.path.display());
                }

                // Reload the config so edits to _config.yml take effect
                match Site::new(&site.base_dir).and_then(|site| site.build()) {
                    Ok(()) => {
                        tracing::info!("rebuilt, reloading clients");
                        let _ = reload_tx.send(());
                    }
                    Err(e) => {
                        tracing::error!("rebuild failed, keeping previous output: {}", e);
                    }
                }
            }
            Ok(Err(e)) => {
                tracing::error!("watch error: {:?}", e);
            }
            Err(e) => {
                tracing::error!("watcher channel closed: {:?}", e);
                break;
            }
        }
    }

    Ok(())
}

/// VCS internals, hidden files, and editor backups change without changing
/// the site. The path is taken relative to the site root so a site that
/// itself lives under a hidden directory is not silenced.
fn is_noise(path: &Path) -> bool {
    if path.to_string_lossy().ends_with('~') {
        return true;
    }
    path.components().any(|c| {
        let part = c.as_os_str().to_string_lossy();
        part.starts_with('.') && part != "." && part != ".."
    })
}

/// WebSocket handler for live reload
async fn livereload_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    let reload_rx = state.reload_tx.subscribe();
    ws.on_upgrade(move |socket| handle_livereload_socket(socket, reload_rx))
}

/// Push reload notices to one connected client until either side hangs up.
async fn handle_livereload_socket(mut socket: WebSocket, mut reload_rx: broadcast::Receiver<()>) {
    tracing::debug!("live reload client connected");

    loop {
        tokio::select! {
            notice = reload_rx.recv() => match notice {
                Ok(()) => {
                    if socket.send(Message::Text("reload".to_string())).await.is_err() {
                        break;
                    }
                }
                // a lagged receiver only missed duplicate notices
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Ping(data))) => {
                    if socket.send(Message::Pong(data)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                _ => {}
            },
        }
    }

    tracing::debug!("live reload client disconnected");
}

/// Serve files from the output directory, injecting the reload script
/// into HTML responses.
async fn fallback_handler(
    State(state): State<Arc<ServerState>>,
    request: Request<Body>,
) -> Response {
    // Hrefs in the rendered pages are percent-encoded
    let path = percent_decode_str(request.uri().path())
        .decode_utf8_lossy()
        .into_owned();

    let file_path = match resolve_request_path(&state.public_dir, &path) {
        Some(file_path) => file_path,
        None => return (StatusCode::NOT_FOUND, "Not found").into_response(),
    };

    let is_html = file_path
        .extension()
        .map(|ext| ext == "html" || ext == "htm")
        .unwrap_or(false);

    if is_html {
        match tokio::fs::read_to_string(&file_path).await {
            Ok(content) => Html(inject_live_reload(&content)).into_response(),
            Err(_) => (StatusCode::NOT_FOUND, "Not found").into_response(),
        }
    } else {
        let mut service = ServeDir::new(&state.public_dir).append_index_html_on_directories(true);
        match service.try_call(request).await {
            Ok(response) => response.into_response(),
            Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response(),
        }
    }
}

/// Map a decoded request path to a file under the output directory.
/// Directory requests resolve to their `index.html`. The path is decoded
/// before this, so `..` arrives literal here; only plain name components
/// may reach the filesystem.
fn resolve_request_path(public_dir: &Path, path: &str) -> Option<PathBuf> {
    let relative = Path::new(path.trim_start_matches('/'));
    if !relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        return None;
    }

    let candidate = public_dir.join(relative);
    if path == "/" || candidate.is_dir() {
        Some(candidate.join("index.html"))
    } else {
        Some(candidate)
    }
}

/// Inject the live reload script into HTML content
fn inject_live_reload(html: &str) -> String {
    if html.contains("</body>") {
        html.replace("</body>", LIVE_RELOAD_SCRIPT)
    } else {
        format!("{}{}", html, LIVE_RELOAD_SCRIPT)
    }
}

/// Open a URL in the default browser
fn open_browser(url: &str) -> Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(url).spawn()?;
    }

    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(url).spawn()?;
    }

    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/c", "start", url])
            .spawn()?;
    }

    Ok(())
}
