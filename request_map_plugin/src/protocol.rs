use std::net::SocketAddr;

pub const INBOUND_CAP: usize = 256;
pub const OUTBOUND_CAP: usize = 256;

pub enum InboundMsg {
    HostConnected {
        socket_addr: SocketAddr,
        session_token: String,
    },
    HostDisconnected,
    Event { event: HostEvent },
}

pub enum OutboundMsg {
    Send { msg: ServerMessage },
}

pub use request_map_protocol::{
    ChatChannel, ErrorCode, HostCommand, HostEvent, MapEntry, SayTarget, ServerMessage,
};
