use crate::error::PluginError;
use crate::protocol::{ErrorCode, HostEvent, InboundMsg, OutboundMsg, ServerMessage};
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};
use tungstenite::protocol::Message;

struct ActiveHost {
    ws: tungstenite::WebSocket<TcpStream>,
    session_token: String,
}

/// Websocket endpoint the host bridge connects to. One bridge at a time.
pub struct NetworkThread {
    shutdown: Arc<AtomicBool>,
    listen_addr: SocketAddr,
    join_handle: Mutex<Option<JoinHandle<()>>>,
}

impl NetworkThread {
    pub fn spawn_with_addr(
        addr: &str,
        in_tx: Sender<InboundMsg>,
        out_rx: Receiver<OutboundMsg>,
    ) -> Result<Self, PluginError> {
        let bind_err = |source: std::io::Error| PluginError::Bind {
            addr: addr.to_string(),
            source,
        };
        let listener = TcpListener::bind(addr).map_err(bind_err)?;
        listener.set_nonblocking(true).map_err(bind_err)?;
        let listen_addr = listener.local_addr().map_err(bind_err)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_for_thread = Arc::clone(&shutdown);

        let join_handle = thread::Builder::new()
            .name("request-map-bridge".to_string())
            .spawn(move || run_server(listener, in_tx, out_rx, shutdown_for_thread))
            .map_err(PluginError::Spawn)?;

        info!(%listen_addr, "host bridge listening");
        Ok(Self {
            shutdown,
            listen_addr,
            join_handle: Mutex::new(Some(join_handle)),
        })
    }

    pub fn listen_addr(&self) -> SocketAddr {
        self.listen_addr
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Ok(mut h) = self.join_handle.lock() {
            if let Some(h) = h.take() {
                let _ = h.join();
            }
        }
    }
}

impl Drop for NetworkThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_server(
    listener: TcpListener,
    in_tx: Sender<InboundMsg>,
    out_rx: Receiver<OutboundMsg>,
    shutdown: Arc<AtomicBool>,
) {
    let mut active: Option<ActiveHost> = None;

    while !shutdown.load(Ordering::Relaxed) {
        // Accept new connections; a new bridge replaces the old one.
        loop {
            match listener.accept() {
                Ok((stream, socket_addr)) => {
                    let _ = stream.set_nonblocking(false);
                    let _ = stream.set_nodelay(true);
                    let _ = stream.set_read_timeout(Some(Duration::from_millis(30)));
                    let _ = stream.set_write_timeout(Some(Duration::from_millis(200)));

                    let mut ws = match tungstenite::accept(stream) {
                        Ok(ws) => ws,
                        Err(e) => {
                            warn!("ws handshake failed: {e}");
                            continue;
                        }
                    };

                    let session_token: String = thread_rng()
                        .sample_iter(&Alphanumeric)
                        .take(32)
                        .map(char::from)
                        .collect();

                    if let Some(mut prev) = active.take() {
                        let _ = prev.ws.close(None);
                        let _ = in_tx.try_send(InboundMsg::HostDisconnected);
                    }

                    if in_tx
                        .try_send(InboundMsg::HostConnected {
                            socket_addr,
                            session_token: session_token.clone(),
                        })
                        .is_err()
                    {
                        let _ = send_server_message(
                            &mut ws,
                            &ServerMessage::Error {
                                msg: "plugin busy".to_string(),
                                code: ErrorCode::Busy,
                            },
                        );
                        let _ = ws.close(None);
                        continue;
                    }

                    // Anything queued while no bridge was attached belongs to no one.
                    let stale = discard_outbound(&out_rx);
                    if stale > 0 {
                        debug!(stale, "dropped host commands queued while disconnected");
                    }

                    let handshake = ServerMessage::Handshake {
                        session_token: session_token.clone(),
                        plugin_version: env!("CARGO_PKG_VERSION").to_string(),
                    };
                    if send_server_message(&mut ws, &handshake).is_err() {
                        let _ = in_tx.try_send(InboundMsg::HostDisconnected);
                        continue;
                    }

                    active = Some(ActiveHost { ws, session_token });
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!("ws accept failed: {e}");
                    break;
                }
            }
        }

        // Outbound: drain queued messages.
        if let Some(host) = active.as_mut() {
            loop {
                match out_rx.try_recv() {
                    Ok(OutboundMsg::Send { msg }) => {
                        if send_server_message(&mut host.ws, &msg).is_err() {
                            let _ = host.ws.close(None);
                            active = None;
                            let _ = in_tx.try_send(InboundMsg::HostDisconnected);
                            break;
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => return,
                }
            }
        }

        // Inbound: read at most one message per loop (timeouts keep the loop moving).
        if let Some(host) = active.as_mut() {
            match host.ws.read() {
                Ok(msg) => {
                    if handle_inbound(&in_tx, host, msg).is_err() {
                        let _ = host.ws.close(None);
                        active = None;
                        let _ = in_tx.try_send(InboundMsg::HostDisconnected);
                    }
                }
                Err(tungstenite::Error::Io(e))
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(tungstenite::Error::ConnectionClosed) => {
                    active = None;
                    let _ = in_tx.try_send(InboundMsg::HostDisconnected);
                }
                Err(e) => {
                    debug!("ws read failed: {e}");
                    active = None;
                    let _ = in_tx.try_send(InboundMsg::HostDisconnected);
                }
            }
        } else {
            discard_outbound(&out_rx);
            thread::sleep(Duration::from_millis(25));
        }
    }

    if let Some(mut host) = active {
        // Flush what was queued before shutdown, e.g. the disable notice.
        while let Ok(OutboundMsg::Send { msg }) = out_rx.try_recv() {
            if send_server_message(&mut host.ws, &msg).is_err() {
                break;
            }
        }
        let _ = host.ws.close(None);
        let _ = host.ws.flush();
    }
}

fn discard_outbound(out_rx: &Receiver<OutboundMsg>) -> usize {
    out_rx.try_iter().count()
}

fn handle_inbound(
    in_tx: &Sender<InboundMsg>,
    host: &mut ActiveHost,
    msg: Message,
) -> Result<(), ()> {
    let text = match msg {
        Message::Text(s) => s,
        Message::Binary(_) => return Ok(()),
        Message::Ping(payload) => {
            let _ = host.ws.send(Message::Pong(payload));
            return Ok(());
        }
        Message::Pong(_) => return Ok(()),
        Message::Close(_) => return Err(()),
        Message::Frame(_) => return Ok(()),
    };

    let event: HostEvent = match serde_json::from_str(&text) {
        Ok(ev) => ev,
        Err(_) => {
            let _ = send_server_message(
                &mut host.ws,
                &ServerMessage::Error {
                    msg: "invalid json".to_string(),
                    code: ErrorCode::InvalidCommand,
                },
            );
            return Ok(());
        }
    };

    if host.session_token != event.session_token() {
        let _ = send_server_message(
            &mut host.ws,
            &ServerMessage::Error {
                msg: "unauthorized".to_string(),
                code: ErrorCode::Unauthorized,
            },
        );
        return Ok(());
    }

    let droppable = matches!(
        event,
        HostEvent::ServerInfo { .. } | HostEvent::MapIndices { .. }
    );
    if in_tx.try_send(InboundMsg::Event { event }).is_err() && !droppable {
        let _ = send_server_message(
            &mut host.ws,
            &ServerMessage::Error {
                msg: "plugin busy".to_string(),
                code: ErrorCode::Busy,
            },
        );
    }

    Ok(())
}

fn send_server_message(
    ws: &mut tungstenite::WebSocket<TcpStream>,
    msg: &ServerMessage,
) -> Result<(), ()> {
    let payload = serde_json::to_string(msg).map_err(|_| ())?;
    ws.send(Message::Text(payload.into())).map_err(|_| ())
}
