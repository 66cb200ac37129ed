use std::fmt::Write;
use std::net::{SocketAddr, TcpListener};
use std::thread;

use axum::Router;
use axum::response::Html;
use axum::routing::get;
use camino::Utf8PathBuf;
use console::style;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::info;

use crate::{Error, HubStatus, ServeOptions};

/// Route of the status dashboard.
pub const DASHBOARD_PATH: &str = "/__kumitate";

/// Data shown on the status dashboard.
#[derive(Clone)]
pub struct Dashboard {
    pub tasks: Vec<String>,
    pub hub: HubStatus,
}

impl Dashboard {
    pub fn render(&self) -> String {
        let mut html = String::from(
            "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>kumitate</title></head><body>",
        );

        let _ = write!(
            html,
            "<h1>kumitate</h1><p>{} live-reload clients connected</p><h2>Tasks</h2><ul>",
            self.hub.connected()
        );
        for task in &self.tasks {
            let _ = write!(html, "<li><code>{task}</code></li>");
        }
        html.push_str("</ul></body></html>");

        html
    }
}

/// Start a static file server for `root` on its own thread.
///
/// The socket is bound before returning, so a busy port is reported to the
/// caller instead of being lost in the server thread.
pub fn serve(
    root: Utf8PathBuf,
    options: &ServeOptions,
    dashboard: Option<Dashboard>,
) -> Result<thread::JoinHandle<anyhow::Result<()>>, Error> {
    let port = options.port;
    let address = SocketAddr::from(([127, 0, 0, 1], port));

    let listener = TcpListener::bind(address)
        .and_then(|listener| {
            listener.set_nonblocking(true)?;
            Ok(listener)
        })
        .map_err(|source| Error::Serve { port, source })?;

    info!(url = %style(format!("http://localhost:{port}/")).yellow(), "starting a HTTP server");

    let router = router(root, options, dashboard);

    Ok(thread::spawn(move || -> anyhow::Result<()> {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?
            .block_on(run(listener, router))
    }))
}

fn router(root: Utf8PathBuf, options: &ServeOptions, dashboard: Option<Dashboard>) -> Router {
    let mut router = Router::new();

    if let Some(dashboard) = dashboard {
        router = router.route(
            DASHBOARD_PATH,
            get(move || {
                let dashboard = dashboard.clone();
                async move { Html(dashboard.render()) }
            }),
        );
    }

    // path to the output directory with the built site
    let mut router = router.fallback_service(ServeDir::new(root));

    if options.cors {
        router = router.layer(CorsLayer::permissive());
    }

    router
}

async fn run(listener: TcpListener, router: Router) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::from_std(listener)?;
    axum::serve(listener, router).await?;

    Ok(())
}
