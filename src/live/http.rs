use std::net::TcpListener;
use std::{io, thread};

use axum::Router;
use axum::http::header;
use axum::routing::get;
use camino::Utf8PathBuf;
use console::style;
use tower_http::services::ServeDir;
use tracing::info;

/// Browser side of live reload. Stylesheets are swapped in place, anything
/// else reloads the page.
const CLIENT: &str = r#"(function () {
  var socket = new WebSocket("ws://" + location.hostname + ":__PORT__");
  socket.onmessage = function (event) {
    var message = JSON.parse(event.data);
    if (message.type !== "css") {
      location.reload();
      return;
    }
    var links = document.querySelectorAll('link[rel="stylesheet"]');
    var swapped = 0;
    links.forEach(function (link) {
      var url = new URL(link.href);
      var name = url.pathname.split("/").pop();
      if (message.paths.indexOf(name) === -1) return;
      url.searchParams.set("livereload", Date.now());
      link.href = url.toString();
      swapped++;
    });
    if (swapped === 0) location.reload();
  };
})();
"#;

pub fn client(ws_port: u16) -> String {
    CLIENT.replace("__PORT__", &ws_port.to_string())
}

/// Serves the live reload client and the theme's assets on `port`. The port
/// is bound before returning, so a taken port is reported to the caller.
pub fn start(
    assets: Utf8PathBuf,
    port: u16,
    ws_port: u16,
) -> io::Result<thread::JoinHandle<Result<(), anyhow::Error>>> {
    let listener = TcpListener::bind(("127.0.0.1", port))?;
    listener.set_nonblocking(true)?;
    info!(url = %style(format!("http://localhost:{port}/")).yellow(), "starting a HTTP server");

    Ok(thread::spawn(move || {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?
            .block_on(serve(assets, listener, ws_port))
            .inspect_err(|e| tracing::error!("HTTP server stopped: {e:#}"))
    }))
}

async fn serve(assets: Utf8PathBuf, listener: TcpListener, ws_port: u16) -> Result<(), anyhow::Error> {
    let address = tokio::net::TcpListener::from_std(listener)?;

    let script = client(ws_port);
    let router = Router::new()
        .route(
            "/__live/client.js",
            get(move || async move { ([(header::CONTENT_TYPE, "application/javascript")], script) }),
        )
        .fallback_service(ServeDir::new(assets));

    axum::serve(address, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_port() {
        let script = client(1337);
        assert!(script.contains("\"ws://\" + location.hostname + \":1337\""));
        assert!(!script.contains("__PORT__"));
    }

    #[test]
    fn test_taken_port_is_an_error() {
        let taken = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();

        let err = start(Utf8PathBuf::from("."), port, 1337).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AddrInUse);
    }
}
