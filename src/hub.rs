//! The live-reload hub is a two-thread system:
//!
//! 1. **Acceptor**: accepts WebSocket connections from open browser tabs and
//!    keeps them in a shared client list, optionally greeting each one.
//! 2. **Broadcaster**: waits on a channel of [`Reload`] signals and forwards
//!    every signal to all connected clients, pruning dead connections.

use std::net::{TcpListener, TcpStream};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tungstenite::WebSocket;

use crate::Reload;
use crate::error::WatchError;
use crate::reload::MESSAGE_READY;

const PORT_PREFERRED: u16 = 35729;
const MAX_CLIENTS: usize = 10;

type Clients = Arc<Mutex<Vec<WebSocket<TcpStream>>>>;

/// Owns the live-reload socket and the set of connected clients.
pub struct ReloadHub {
    port: u16,
    clients: Clients,
    sender: Sender<Reload>,
    _threads: (JoinHandle<()>, JoinHandle<()>),
}

impl ReloadHub {
    /// Bind the reload socket and spawn the acceptor and broadcaster.
    pub fn start(greet: bool) -> Result<Self, WatchError> {
        let (tcp, port) = reserve_port().map_err(WatchError::Bind)?;
        let clients = Clients::default();

        let thread_i = new_thread_ws_incoming(tcp, clients.clone(), greet);
        let (sender, rx) = std::sync::mpsc::channel();
        let thread_o = new_thread_ws_reload(rx, clients.clone());

        tracing::info!("live-reload socket listening on port {port}");

        Ok(Self {
            port,
            clients,
            sender,
            _threads: (thread_i, thread_o),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn sender(&self) -> Sender<Reload> {
        self.sender.clone()
    }

    pub fn status(&self) -> HubStatus {
        HubStatus {
            clients: self.clients.clone(),
        }
    }
}

/// Read-only view of the hub, shareable with other threads.
#[derive(Clone, Default)]
pub struct HubStatus {
    clients: Clients,
}

impl HubStatus {
    /// Number of currently connected clients.
    pub fn connected(&self) -> usize {
        self.clients.lock().map(|c| c.len()).unwrap_or(0)
    }
}

fn reserve_port() -> std::io::Result<(TcpListener, u16)> {
    let listener = match TcpListener::bind(("127.0.0.1", PORT_PREFERRED)) {
        Ok(sock) => sock,
        Err(_) => TcpListener::bind("127.0.0.1:0")?,
    };

    let addr = listener.local_addr()?;
    let port = addr.port();
    Ok((listener, port))
}

fn new_thread_ws_incoming(server: TcpListener, clients: Clients, greet: bool) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for stream in server.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::warn!("live-reload connection failed: {e}");
                    continue;
                }
            };

            let mut socket = match tungstenite::accept(stream) {
                Ok(socket) => socket,
                Err(e) => {
                    tracing::warn!("live-reload handshake failed: {e}");
                    continue;
                }
            };

            if greet && let Err(e) = socket.send(MESSAGE_READY.into()) {
                tracing::warn!("couldn't greet live-reload client: {e}");
                continue;
            }

            match clients.lock() {
                Ok(mut clients) => clients.push(socket),
                Err(_) => break,
            }
        }
    })
}

fn new_thread_ws_reload(rx: Receiver<Reload>, clients: Clients) -> JoinHandle<()> {
    std::thread::spawn(move || {
        while let Ok(reload) = rx.recv() {
            let Ok(mut clients) = clients.lock() else {
                break;
            };

            tracing::debug!("sending {reload:?} to {} clients", clients.len());
            let mut broken = vec![];

            for (i, socket) in clients.iter_mut().enumerate() {
                match socket.send(reload.as_message().into()) {
                    Ok(_) => {}
                    Err(tungstenite::error::Error::Io(e)) => {
                        if e.kind() == std::io::ErrorKind::BrokenPipe {
                            broken.push(i);
                        }
                    }
                    Err(
                        tungstenite::error::Error::ConnectionClosed
                        | tungstenite::error::Error::AlreadyClosed,
                    ) => broken.push(i),
                    Err(e) => {
                        tracing::error!("Error: {e:?}");
                    }
                }
            }

            for i in broken.into_iter().rev() {
                clients.remove(i);
            }

            // Close all but the last few connections
            let len = clients.len();
            if len > MAX_CLIENTS {
                for mut socket in clients.drain(0..len - MAX_CLIENTS) {
                    socket.close(None).ok();
                }
            }
        }
    })
}
