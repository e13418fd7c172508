pub mod catalog;
pub mod command;
pub mod config;
pub mod error;
pub mod host_api;
pub mod main_loop;
pub mod net;
pub mod protocol;
pub mod request;
pub mod timer;

pub use crate::config::PluginConfig;
pub use crate::error::PluginError;
pub use crate::host_api::{BridgeHost, HostApi};
pub use crate::main_loop::MainLoop;
pub use crate::net::NetworkThread;
pub use crate::protocol::{InboundMsg, OutboundMsg, INBOUND_CAP, OUTBOUND_CAP};

use crossbeam_channel::bounded;
use std::net::SocketAddr;
use std::sync::Mutex;
use tracing::{info, warn};

pub const PLUGIN_NAME: &str = "Request Map";
pub const PLUGIN_VERSION: &str = env!("CARGO_PKG_VERSION");

/// An enabled plugin: the bridge thread plus the main loop it feeds.
pub struct RequestMapPlugin {
    main_loop: Mutex<MainLoop>,
    net: NetworkThread,
    host: BridgeHost,
}

impl RequestMapPlugin {
    pub fn enable(config: &PluginConfig) -> Result<Self, PluginError> {
        config.validate()?;

        let (in_tx, in_rx) = bounded(INBOUND_CAP);
        let (out_tx, out_rx) = bounded(OUTBOUND_CAP);

        let net = NetworkThread::spawn_with_addr(&config.bind_addr, in_tx, out_rx)?;
        let host = BridgeHost::new(out_tx.clone());
        let main_loop = MainLoop::new(in_rx, out_tx, config);

        info!(
            plugin = PLUGIN_NAME,
            version = PLUGIN_VERSION,
            vote_duration = config.vote_duration,
            approve_threshold = config.approve_threshold,
            "plugin enabled"
        );
        Ok(Self {
            main_loop: Mutex::new(main_loop),
            net,
            host,
        })
    }

    pub fn listen_addr(&self) -> SocketAddr {
        self.net.listen_addr()
    }

    /// One serialized pass over pending host events and due timers.
    pub fn tick(&self) {
        let Ok(mut main_loop) = self.main_loop.lock() else {
            warn!("main loop lock poisoned, skipping tick");
            return;
        };
        main_loop.tick(&self.host);
    }

    /// Runs `f` with exclusive access to the main loop.
    pub fn with_main_loop<R>(&self, f: impl FnOnce(&MainLoop) -> R) -> Option<R> {
        let main_loop = self.main_loop.lock().ok()?;
        Some(f(&main_loop))
    }

    pub fn disable(self) {
        if let Ok(mut main_loop) = self.main_loop.lock() {
            main_loop.disable();
        }
        self.net.shutdown();
        info!(plugin = PLUGIN_NAME, "plugin disabled");
    }
}
