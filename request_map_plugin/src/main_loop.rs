use crate::catalog::MapCatalog;
use crate::command;
use crate::config::PluginConfig;
use crate::host_api::HostApi;
use crate::protocol::{ErrorCode, HostEvent, InboundMsg, OutboundMsg, ServerMessage};
use crate::request::{Context, Effect, RequestMachine, RequestState, VoteRules};
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::time::Instant;
use tracing::{debug, info};

/// Single owner of the request state. Chat events and timer expiry are both
/// applied from `tick`, one at a time.
pub struct MainLoop {
    inbound_rx: Receiver<InboundMsg>,
    outbound_tx: Sender<OutboundMsg>,
    machine: RequestMachine,
    catalog: MapCatalog,

    player_count: u32,
    host_session: Option<String>,
    map_indices: Option<(usize, usize)>,
}

impl MainLoop {
    pub fn new(
        inbound_rx: Receiver<InboundMsg>,
        outbound_tx: Sender<OutboundMsg>,
        config: &PluginConfig,
    ) -> Self {
        Self {
            inbound_rx,
            outbound_tx,
            machine: RequestMachine::new(VoteRules::from(config)),
            catalog: MapCatalog::default(),
            player_count: 0,
            host_session: None,
            map_indices: None,
        }
    }

    pub fn tick(&mut self, host: &dyn HostApi) {
        loop {
            match self.inbound_rx.try_recv() {
                Ok(msg) => self.apply_inbound(host, msg),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => break,
            }
        }

        let ctx = Context {
            now: host.now(),
            catalog: &self.catalog,
            player_count: self.player_count,
        };
        let effects = self.machine.fire_due(ctx);
        apply_effects(host, effects);
    }

    pub fn try_send(&mut self, msg: OutboundMsg) {
        let _ = self.outbound_tx.try_send(msg);
    }

    /// Resets the request and tells the bridge the plugin is going away.
    pub fn disable(&mut self) {
        self.machine.disable();
        self.try_send(OutboundMsg::Send {
            msg: ServerMessage::Error {
                msg: "plugin disabled".to_string(),
                code: ErrorCode::InternalError,
            },
        });
    }

    pub fn request_state(&self) -> &RequestState {
        self.machine.state()
    }

    pub fn catalog(&self) -> &MapCatalog {
        &self.catalog
    }

    pub fn host_connected(&self) -> bool {
        self.host_session.is_some()
    }

    pub fn player_count(&self) -> u32 {
        self.player_count
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.machine.next_deadline()
    }

    fn apply_inbound(&mut self, host: &dyn HostApi, msg: InboundMsg) {
        match msg {
            InboundMsg::HostConnected {
                socket_addr,
                session_token,
            } => {
                info!(%socket_addr, "host bridge connected");
                self.host_session = Some(session_token);
            }
            InboundMsg::HostDisconnected => {
                info!("host bridge disconnected");
                self.host_session = None;
            }
            InboundMsg::Event { event } => self.apply_event(host, event),
        }
    }

    fn apply_event(&mut self, host: &dyn HostApi, event: HostEvent) {
        match event {
            HostEvent::ServerInfo { player_count, .. } => {
                self.player_count = player_count;
            }
            HostEvent::MapList { maps, .. } => {
                info!(maps = maps.len(), "maplist was loaded");
                self.catalog.replace(maps);
            }
            HostEvent::MapIndices { current, next, .. } => {
                if self.map_indices.map(|(_, n)| n) == Some(next) {
                    debug!(current, next, "map indices reported");
                } else {
                    let label = self.catalog.label(next).unwrap_or_default();
                    info!(current, next, map = %label, "next map set on host");
                }
                self.map_indices = Some((current, next));
            }
            HostEvent::Chat {
                player, message, ..
            } => {
                let cmd = command::parse(&message);
                if cmd == command::Command::None {
                    return;
                }
                debug!(%player, ?cmd, "chat command");
                let ctx = Context {
                    now: host.now(),
                    catalog: &self.catalog,
                    player_count: self.player_count,
                };
                let effects = self.machine.handle(ctx, &player, cmd);
                apply_effects(host, effects);
            }
        }
    }
}

fn apply_effects(host: &dyn HostApi, effects: Vec<Effect>) {
    for effect in effects {
        match effect {
            Effect::Broadcast(text) => host.broadcast(&text),
            Effect::Tell { player, text } => host.tell(&player, &text),
            Effect::SwitchTo { index } => host.switch_to_map(index),
            Effect::QueryMapIndices => host.query_map_indices(),
        }
    }
}
