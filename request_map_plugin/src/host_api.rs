use crate::protocol::{HostCommand, OutboundMsg, SayTarget, ServerMessage};
use crossbeam_channel::Sender;
use std::time::Instant;

/// Everything the plugin asks of the game server it runs inside.
pub trait HostApi {
    fn now(&self) -> Instant;
    fn broadcast(&self, text: &str);
    fn tell(&self, player: &str, text: &str);
    fn switch_to_map(&self, index: usize);
    fn query_map_indices(&self);
}

/// Forwards host calls to the connected bridge as `HostCommand`s.
#[derive(Clone)]
pub struct BridgeHost {
    outbound_tx: Sender<OutboundMsg>,
}

impl BridgeHost {
    pub fn new(outbound_tx: Sender<OutboundMsg>) -> Self {
        Self { outbound_tx }
    }

    fn send(&self, command: HostCommand) {
        // Best-effort: a full queue means no bridge is draining it.
        let _ = self.outbound_tx.try_send(OutboundMsg::Send {
            msg: ServerMessage::Command { command },
        });
    }
}

impl HostApi for BridgeHost {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn broadcast(&self, text: &str) {
        self.send(HostCommand::Say {
            text: text.to_string(),
            target: SayTarget::All,
        });
    }

    fn tell(&self, player: &str, text: &str) {
        self.send(HostCommand::Say {
            text: text.to_string(),
            target: SayTarget::Player {
                name: player.to_string(),
            },
        });
    }

    fn switch_to_map(&self, index: usize) {
        self.send(HostCommand::SetNextMapIndex { index });
        self.send(HostCommand::RunNextRound);
    }

    fn query_map_indices(&self) {
        self.send(HostCommand::GetMapIndices);
    }
}
