//! Development server.
//!
//! Live reload is implemented as a three-part system:
//!
//! 1. **WebSocket server**: a dedicated thread accepts connections from open
//!    browser tabs with `tungstenite`, another one broadcasts every
//!    [`Reload`] pushed through the [`Context`].
//! 2. **HTTP server**: delivers the client script and the theme's assets.
//! 3. **Snippet**: a `<script>` tag injected into the theme's `footer.php`
//!    loads the client in every page served through the WordPress proxy.
//!
//! The snippet is removed again when the [`DevServer`] is dropped or the
//! process is interrupted.

mod http;
mod snippet;
mod watch;

pub use watch::watch;

use std::net::{TcpListener, TcpStream};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use camino::Utf8PathBuf;
use console::style;
use serde::Serialize;
use tungstenite::WebSocket;

use crate::error::WatchError;
use crate::{Context, Reload};

/// Live reload message as sent over the websocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Message {
    Css { paths: Vec<String> },
    Reload,
}

impl From<Reload> for Message {
    fn from(reload: Reload) -> Self {
        match reload {
            Reload::Css(paths) => Message::Css {
                paths: paths
                    .iter()
                    .filter_map(|path| path.file_name())
                    .map(String::from)
                    .collect(),
            },
            Reload::Page => Message::Reload,
        }
    }
}

/// Running dev server. Dropping it removes the live reload snippet.
pub struct DevServer {
    footer: Option<Utf8PathBuf>,
}

impl DevServer {
    pub fn start(ctx: &Context) -> Result<Self, WatchError> {
        let (tcp, ws_port) = reserve_port(ctx.config.live_port)?;
        let clients = Arc::new(Mutex::new(vec![]));

        let port = ctx.config.http_port;
        let _thread_http = http::start(ctx.path(ctx.paths.assets()), port, ws_port)?;

        let _thread_i = new_thread_ws_incoming(tcp, clients.clone());
        let (tx_reload, _thread_o) = new_thread_ws_reload(clients);
        if !ctx.attach_reload(tx_reload) {
            tracing::warn!("live reload is already attached");
        }

        let footer = ctx.path(ctx.paths.footer());
        let footer = match snippet::inject(&footer, &snippet::markup(port)) {
            Ok(true) => {
                let _thread_s = on_interrupt(footer.clone());
                Some(footer)
            }
            Ok(false) => {
                tracing::warn!("{footer} not found, live reload snippet not injected");
                None
            }
            Err(e) => return Err(WatchError::Snippet(footer, e)),
        };

        tracing::info!(
            proxy = %style(&ctx.config.proxy).yellow(),
            "live reload on port {ws_port}, browse the site through the proxy"
        );

        Ok(Self { footer })
    }
}

impl Drop for DevServer {
    fn drop(&mut self) {
        if let Some(footer) = &self.footer
            && let Err(e) = snippet::remove(footer)
        {
            tracing::error!("couldn't remove the live reload snippet from {footer}: {e}");
        }
    }
}

/// Removes the snippet and exits when the process is interrupted.
fn on_interrupt(footer: Utf8PathBuf) -> JoinHandle<anyhow::Result<()>> {
    std::thread::spawn(move || {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?
            .block_on(tokio::signal::ctrl_c())?;

        snippet::remove(&footer)?;
        std::process::exit(130)
    })
}

fn reserve_port(preferred: u16) -> std::io::Result<(TcpListener, u16)> {
    let listener = match TcpListener::bind(("127.0.0.1", preferred)) {
        Ok(sock) => sock,
        Err(_) => TcpListener::bind("127.0.0.1:0")?,
    };

    let addr = listener.local_addr()?;
    let port = addr.port();
    Ok((listener, port))
}

fn new_thread_ws_incoming(
    server: TcpListener,
    clients: Arc<Mutex<Vec<WebSocket<TcpStream>>>>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for stream in server.incoming() {
            let socket = match stream.map_err(anyhow::Error::from).and_then(|stream| {
                tungstenite::accept(stream).map_err(|e| anyhow::anyhow!("{e}"))
            }) {
                Ok(socket) => socket,
                Err(e) => {
                    tracing::warn!("rejected live reload client: {e}");
                    continue;
                }
            };

            if let Ok(mut clients) = clients.lock() {
                clients.push(socket);
            }
        }
    })
}

fn new_thread_ws_reload(
    clients: Arc<Mutex<Vec<WebSocket<TcpStream>>>>,
) -> (Sender<Reload>, JoinHandle<()>) {
    let (tx, rx) = std::sync::mpsc::channel::<Reload>();

    let thread = std::thread::spawn(move || {
        while let Ok(reload) = rx.recv() {
            let payload = match serde_json::to_string(&Message::from(reload)) {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::error!("couldn't encode live reload message: {e}");
                    continue;
                }
            };

            let Ok(mut clients) = clients.lock() else {
                break;
            };
            let mut broken = vec![];

            for (i, socket) in clients.iter_mut().enumerate() {
                match socket.send(tungstenite::Message::text(payload.clone())) {
                    Ok(_) => {}
                    Err(tungstenite::error::Error::Io(e)) => {
                        if e.kind() == std::io::ErrorKind::BrokenPipe {
                            broken.push(i);
                        }
                    }
                    Err(e) => {
                        tracing::error!("Error: {e:?}");
                        broken.push(i);
                    }
                }
            }

            for i in broken.into_iter().rev() {
                clients.remove(i);
            }

            // Close all but the last 10 connections
            let len = clients.len();
            if len > 10 {
                for mut socket in clients.drain(0..len - 10) {
                    socket.close(None).ok();
                }
            }
        }
    });

    (tx, thread)
}
