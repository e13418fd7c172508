use serde::{Deserialize, Serialize};

/// One entry of the host's map rotation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MapEntry {
    pub index: usize,
    pub internal_name: String,
    pub mode: String,
    pub display_name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChatChannel {
    Global,
    Team,
    Squad,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthorized,
    Busy,
    InvalidCommand,
    InternalError,
}

/// Messages the plugin sends to the connected host bridge.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ServerMessage {
    Handshake {
        session_token: String,
        plugin_version: String,
    },
    Command {
        command: HostCommand,
    },
    Error {
        msg: String,
        code: ErrorCode,
    },
}

/// Actions the host executes on behalf of the plugin.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "action")]
pub enum HostCommand {
    Say { text: String, target: SayTarget },
    SetNextMapIndex { index: usize },
    RunNextRound,
    GetMapIndices,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "scope")]
pub enum SayTarget {
    All,
    Player { name: String },
}

/// Events pushed by the host bridge.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum HostEvent {
    ServerInfo {
        session_token: String,
        player_count: u32,
    },
    Chat {
        session_token: String,
        player: String,
        message: String,
        #[serde(default = "default_channel")]
        channel: ChatChannel,
    },
    MapList {
        session_token: String,
        maps: Vec<MapEntry>,
    },
    MapIndices {
        session_token: String,
        current: usize,
        next: usize,
    },
}

fn default_channel() -> ChatChannel {
    ChatChannel::Global
}

impl HostEvent {
    pub fn session_token(&self) -> &str {
        match self {
            HostEvent::ServerInfo { session_token, .. } => session_token,
            HostEvent::Chat { session_token, .. } => session_token,
            HostEvent::MapList { session_token, .. } => session_token,
            HostEvent::MapIndices { session_token, .. } => session_token,
        }
    }

    /// Returns the same event stamped with `token`.
    pub fn with_token(self, token: &str) -> HostEvent {
        let session_token = token.to_string();
        match self {
            HostEvent::ServerInfo { player_count, .. } => HostEvent::ServerInfo {
                session_token,
                player_count,
            },
            HostEvent::Chat {
                player,
                message,
                channel,
                ..
            } => HostEvent::Chat {
                session_token,
                player,
                message,
                channel,
            },
            HostEvent::MapList { maps, .. } => HostEvent::MapList {
                session_token,
                maps,
            },
            HostEvent::MapIndices { current, next, .. } => HostEvent::MapIndices {
                session_token,
                current,
                next,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_without_channel_defaults_to_global() {
        let json = r#"{"type":"chat","session_token":"t","player":"JiN","message":"!maps"}"#;
        let ev: HostEvent = serde_json::from_str(json).unwrap();
        match ev {
            HostEvent::Chat { channel, .. } => assert_eq!(channel, ChatChannel::Global),
            other => panic!("expected chat, got {other:?}"),
        }
    }

    #[test]
    fn say_command_wire_shape() {
        let msg = ServerMessage::Command {
            command: HostCommand::Say {
                text: "hi".to_string(),
                target: SayTarget::Player {
                    name: "JiN".to_string(),
                },
            },
        };
        let v: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(v["type"], "command");
        assert_eq!(v["command"]["action"], "say");
        assert_eq!(v["command"]["target"]["scope"], "player");
        assert_eq!(v["command"]["target"]["name"], "JiN");
    }

    #[test]
    fn with_token_replaces_only_the_token() {
        let ev = HostEvent::MapIndices {
            session_token: String::new(),
            current: 2,
            next: 3,
        }
        .with_token("abc");
        assert_eq!(ev.session_token(), "abc");
        assert!(matches!(ev, HostEvent::MapIndices { current: 2, next: 3, .. }));
    }
}
