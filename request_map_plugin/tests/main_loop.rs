use crossbeam_channel::{bounded, Receiver, Sender};
use request_map_plugin::protocol::{ChatChannel, HostCommand, HostEvent, MapEntry, SayTarget, ServerMessage};
use request_map_plugin::request::RequestStatus;
use request_map_plugin::{BridgeHost, HostApi, InboundMsg, MainLoop, OutboundMsg, PluginConfig};
use std::cell::{Cell, RefCell};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Broadcast(String),
    Tell(String, String),
    Switch(usize),
    QueryIndices,
}

struct RecordingHost {
    now: Cell<Instant>,
    calls: RefCell<Vec<Call>>,
}

impl RecordingHost {
    fn new() -> Self {
        Self {
            now: Cell::new(Instant::now()),
            calls: RefCell::new(Vec::new()),
        }
    }

    fn advance(&self, secs: u64) {
        self.now.set(self.now.get() + Duration::from_secs(secs));
    }

    fn take(&self) -> Vec<Call> {
        std::mem::take(&mut *self.calls.borrow_mut())
    }
}

impl HostApi for RecordingHost {
    fn now(&self) -> Instant {
        self.now.get()
    }
    fn broadcast(&self, text: &str) {
        self.calls.borrow_mut().push(Call::Broadcast(text.to_string()));
    }
    fn tell(&self, player: &str, text: &str) {
        self.calls
            .borrow_mut()
            .push(Call::Tell(player.to_string(), text.to_string()));
    }
    fn switch_to_map(&self, index: usize) {
        self.calls.borrow_mut().push(Call::Switch(index));
    }
    fn query_map_indices(&self) {
        self.calls.borrow_mut().push(Call::QueryIndices);
    }
}

struct Fixture {
    in_tx: Sender<InboundMsg>,
    _out_rx: Receiver<OutboundMsg>,
    main_loop: MainLoop,
    host: RecordingHost,
}

impl Fixture {
    fn new(config: PluginConfig) -> Self {
        let (in_tx, in_rx) = bounded(request_map_plugin::INBOUND_CAP);
        let (out_tx, out_rx) = bounded(request_map_plugin::OUTBOUND_CAP);
        let main_loop = MainLoop::new(in_rx, out_tx, &config);
        let fx = Self {
            in_tx,
            _out_rx: out_rx,
            main_loop,
            host: RecordingHost::new(),
        };
        fx.push(HostEvent::MapList {
            session_token: String::new(),
            maps: vec![
                map(0, "MP_Subway", "ConquestLarge0", "Operation Metro"),
                map(1, "XP1_001", "SquadDeathMatch0", "Strike at Karkand"),
            ],
        });
        fx.push(HostEvent::ServerInfo {
            session_token: String::new(),
            player_count: 12,
        });
        fx
    }

    fn push(&self, event: HostEvent) {
        self.in_tx.send(InboundMsg::Event { event }).unwrap();
    }

    fn chat(&self, player: &str, message: &str) {
        self.push(HostEvent::Chat {
            session_token: String::new(),
            player: player.to_string(),
            message: message.to_string(),
            channel: ChatChannel::Team,
        });
    }

    fn tick(&mut self) {
        self.main_loop.tick(&self.host);
    }
}

fn map(index: usize, internal: &str, mode: &str, display: &str) -> MapEntry {
    MapEntry {
        index,
        internal_name: internal.to_string(),
        mode: mode.to_string(),
        display_name: display.to_string(),
    }
}

fn config(threshold: u32) -> PluginConfig {
    PluginConfig {
        vote_duration: 10,
        map_switch_delay: 5,
        cooldown_delay: 30,
        approve_threshold: threshold,
        ..PluginConfig::default()
    }
}

#[test]
fn host_feeds_catalog_and_player_count() {
    let mut fx = Fixture::new(config(1));
    fx.push(HostEvent::MapIndices {
        session_token: String::new(),
        current: 0,
        next: 1,
    });
    fx.tick();

    assert_eq!(fx.main_loop.catalog().len(), 2);
    assert_eq!(fx.main_loop.player_count(), 12);
    assert!(fx.host.take().is_empty());
}

#[test]
fn full_vote_switches_map() {
    let mut fx = Fixture::new(config(2));
    fx.chat("alice", "!request karkand");
    fx.chat("bob", "!approve");
    fx.chat("chatty", "gg");
    fx.chat("carol", "/approve");
    fx.tick();

    assert_eq!(
        fx.host.take(),
        vec![
            Call::Broadcast("alice requested Strike at Karkand [SQDM]".to_string()),
            Call::Broadcast("Request was approved by bob".to_string()),
            Call::Broadcast("Request was approved by carol".to_string()),
            Call::Broadcast("Next map will load in 5 seconds...".to_string()),
        ]
    );
    assert_eq!(fx.main_loop.request_state().status, RequestStatus::Approved);

    fx.host.advance(4);
    fx.tick();
    assert!(fx.host.take().is_empty());

    fx.host.advance(1);
    fx.tick();
    assert_eq!(fx.host.take(), vec![Call::Switch(1), Call::QueryIndices]);
    assert_eq!(fx.main_loop.request_state().status, RequestStatus::Idle);
    assert!(fx.main_loop.next_deadline().is_none());
}

#[test]
fn approval_queued_before_timeout_wins_the_tick() {
    let mut fx = Fixture::new(config(1));
    fx.chat("alice", "!request 0");
    fx.tick();
    fx.host.take();

    // The vote deadline passes while the approval is still queued.
    fx.host.advance(10);
    fx.chat("bob", "!approve");
    fx.tick();

    let calls = fx.host.take();
    assert!(!calls
        .iter()
        .any(|c| matches!(c, Call::Broadcast(t) if t.starts_with("Map request was not approved"))));
    assert_eq!(fx.main_loop.request_state().status, RequestStatus::Approved);

    fx.host.advance(5);
    fx.tick();
    assert_eq!(fx.host.take(), vec![Call::Switch(0), Call::QueryIndices]);
}

#[test]
fn rejected_commands_reply_privately() {
    let mut fx = Fixture::new(config(2));
    fx.chat("alice", "!request 0");
    fx.chat("alice", "!approve");
    fx.chat("bob", "!abort");
    fx.tick();

    assert_eq!(
        fx.host.take(),
        vec![
            Call::Broadcast("alice requested Operation Metro [CQ]".to_string()),
            Call::Tell(
                "alice".to_string(),
                "You cannot approve your own request!".to_string()
            ),
            Call::Tell("bob".to_string(), "You didn't create current request!".to_string()),
        ]
    );
}

#[test]
fn disable_resets_and_notifies_bridge() {
    let (in_tx, in_rx) = bounded(request_map_plugin::INBOUND_CAP);
    let (out_tx, out_rx) = bounded(request_map_plugin::OUTBOUND_CAP);
    let mut main_loop = MainLoop::new(in_rx, out_tx, &config(1));
    let host = RecordingHost::new();

    in_tx
        .send(InboundMsg::Event {
            event: HostEvent::MapList {
                session_token: String::new(),
                maps: vec![map(0, "MP_001", "RushLarge0", "Grand Bazaar")],
            },
        })
        .unwrap();
    in_tx
        .send(InboundMsg::Event {
            event: HostEvent::Chat {
                session_token: String::new(),
                player: "alice".to_string(),
                message: "!request bazaar".to_string(),
                channel: ChatChannel::Global,
            },
        })
        .unwrap();
    main_loop.tick(&host);
    assert_eq!(main_loop.request_state().status, RequestStatus::Pending);
    host.take();

    main_loop.disable();
    assert_eq!(main_loop.request_state().status, RequestStatus::Idle);
    match out_rx.try_recv() {
        Ok(OutboundMsg::Send {
            msg: ServerMessage::Error { msg, .. },
        }) => assert_eq!(msg, "plugin disabled"),
        _ => panic!("expected disable notice"),
    }

    host.advance(60);
    main_loop.tick(&host);
    assert!(host.take().is_empty());
}

#[test]
fn bridge_host_translates_calls_to_commands() {
    let (out_tx, out_rx) = bounded(16);
    let host = BridgeHost::new(out_tx);
    host.tell("alice", "hi");
    host.broadcast("all");
    host.switch_to_map(4);
    host.query_map_indices();

    let commands: Vec<HostCommand> = out_rx
        .try_iter()
        .map(|m| match m {
            OutboundMsg::Send {
                msg: ServerMessage::Command { command },
            } => command,
            _ => panic!("expected command"),
        })
        .collect();
    assert_eq!(
        commands,
        vec![
            HostCommand::Say {
                text: "hi".to_string(),
                target: SayTarget::Player {
                    name: "alice".to_string()
                },
            },
            HostCommand::Say {
                text: "all".to_string(),
                target: SayTarget::All,
            },
            HostCommand::SetNextMapIndex { index: 4 },
            HostCommand::RunNextRound,
            HostCommand::GetMapIndices,
        ]
    );
}
