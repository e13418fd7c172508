use clap::Parser;
use crossbeam_channel::{unbounded, Receiver, TryRecvError};
use request_map_protocol::{
    ChatChannel, HostCommand, HostEvent, MapEntry, SayTarget, ServerMessage,
};
use std::io::BufRead;
use std::net::TcpStream;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{connect, Message, WebSocket};

type Socket = WebSocket<MaybeTlsStream<TcpStream>>;

/// Plays the game server side of the request-map bridge from a terminal.
///
/// Lines typed as `player: message` are delivered as chat. Lines starting
/// with `:` are console commands (`:players N`, `:maps`, `:quit`).
#[derive(Parser, Debug)]
#[command(name = "request_map_console")]
struct Args {
    #[arg(long, default_value = "ws://127.0.0.1:9012", env = "REQUEST_MAP_WS_URL")]
    ws_url: String,

    /// JSON array of map entries; a small demo rotation is used otherwise.
    #[arg(long, value_name = "PATH")]
    maps_file: Option<PathBuf>,

    #[arg(long, default_value_t = 8)]
    players: u32,
}

/// What the emulated server believes about its own rotation.
#[derive(Debug, Default)]
struct ServerView {
    current: usize,
    next: usize,
}

enum Input {
    Event(HostEvent),
    ShowRotation,
    Quit,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let maps = match &args.maps_file {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("failed to read maps file {}: {e}", path.display()))?;
            serde_json::from_str::<Vec<MapEntry>>(&text)?
        }
        None => demo_rotation(),
    };

    let (mut ws, _resp) = connect(args.ws_url.as_str())?;
    let session_token = wait_handshake(&mut ws)?;
    eprintln!("connected to {} ({} maps, {} players)", args.ws_url, maps.len(), args.players);

    send_event(
        &mut ws,
        HostEvent::MapList {
            session_token: String::new(),
            maps: maps.clone(),
        },
        &session_token,
    )?;
    send_event(
        &mut ws,
        HostEvent::ServerInfo {
            session_token: String::new(),
            player_count: args.players,
        },
        &session_token,
    )?;

    if let MaybeTlsStream::Plain(stream) = ws.get_mut() {
        stream.set_read_timeout(Some(Duration::from_millis(50)))?;
    }

    let input = spawn_stdin_reader();
    let mut view = ServerView::default();

    loop {
        match input.try_recv() {
            Ok(Input::Event(event)) => send_event(&mut ws, event, &session_token)?,
            Ok(Input::ShowRotation) => {
                for m in &maps {
                    let marker = if m.index == view.current { "*" } else { " " };
                    println!("{marker} {}: {} ({}, {})", m.index, m.display_name, m.internal_name, m.mode);
                }
            }
            Ok(Input::Quit) | Err(TryRecvError::Disconnected) => break,
            Err(TryRecvError::Empty) => {}
        }

        match ws.read() {
            Ok(Message::Text(text)) => {
                let server: ServerMessage = serde_json::from_str(&text)?;
                if let Some(reply) = handle_server_message(server, &mut view, &maps) {
                    send_event(&mut ws, reply, &session_token)?;
                }
            }
            Ok(Message::Close(_)) => {
                eprintln!("plugin closed the connection");
                break;
            }
            Ok(_) => {}
            Err(tungstenite::Error::Io(e))
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(e) => return Err(e.into()),
        }
    }

    let _ = ws.close(None);
    Ok(())
}

fn wait_handshake(ws: &mut Socket) -> anyhow::Result<String> {
    loop {
        let msg = ws.read()?;
        let Message::Text(text) = msg else { continue };
        let server: ServerMessage = serde_json::from_str(&text)?;
        match server {
            ServerMessage::Handshake {
                session_token,
                plugin_version,
            } => {
                debug!(%plugin_version, "handshake");
                return Ok(session_token);
            }
            ServerMessage::Error { msg, code } => {
                anyhow::bail!("plugin refused connection: {msg} ({code:?})");
            }
            ServerMessage::Command { .. } => {}
        }
    }
}

fn send_event(ws: &mut Socket, event: HostEvent, token: &str) -> anyhow::Result<()> {
    let payload = serde_json::to_string(&event.with_token(token))?;
    ws.send(Message::Text(payload.into()))?;
    Ok(())
}

/// Prints what the plugin asked for and plays the server's part.
fn handle_server_message(
    msg: ServerMessage,
    view: &mut ServerView,
    maps: &[MapEntry],
) -> Option<HostEvent> {
    match msg {
        ServerMessage::Command { command } => match command {
            HostCommand::Say {
                text,
                target: SayTarget::All,
            } => {
                println!("[all] {text}");
                None
            }
            HostCommand::Say {
                text,
                target: SayTarget::Player { name },
            } => {
                println!("[to {name}] {text}");
                None
            }
            HostCommand::SetNextMapIndex { index } => {
                if index >= maps.len() {
                    warn!(index, "plugin picked an index outside the rotation");
                }
                println!(">> mapList.setNextMapIndex {index}");
                view.next = index;
                None
            }
            HostCommand::RunNextRound => {
                println!(">> mapList.runNextRound");
                view.current = view.next;
                view.next = (view.current + 1) % maps.len().max(1);
                None
            }
            HostCommand::GetMapIndices => Some(HostEvent::MapIndices {
                session_token: String::new(),
                current: view.current,
                next: view.next,
            }),
        },
        ServerMessage::Error { msg, code } => {
            eprintln!("plugin error: {msg} ({code:?})");
            None
        }
        ServerMessage::Handshake { .. } => None,
    }
}

fn spawn_stdin_reader() -> Receiver<Input> {
    let (tx, rx) = unbounded();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let Some(input) = parse_input(&line) else {
                eprintln!("expected `player: message` or :players N / :maps / :quit");
                continue;
            };
            let quit = matches!(input, Input::Quit);
            if tx.send(input).is_err() || quit {
                break;
            }
        }
    });
    rx
}

fn parse_input(line: &str) -> Option<Input> {
    let line = line.trim();
    if let Some(cmd) = line.strip_prefix(':') {
        let mut parts = cmd.split_whitespace();
        return match parts.next()? {
            "quit" => Some(Input::Quit),
            "maps" => Some(Input::ShowRotation),
            "players" => {
                let player_count = parts.next()?.parse().ok()?;
                Some(Input::Event(HostEvent::ServerInfo {
                    session_token: String::new(),
                    player_count,
                }))
            }
            _ => None,
        };
    }

    let (player, message) = line.split_once(':')?;
    let player = player.trim();
    if player.is_empty() {
        return None;
    }
    Some(Input::Event(HostEvent::Chat {
        session_token: String::new(),
        player: player.to_string(),
        message: message.trim().to_string(),
        channel: ChatChannel::Global,
    }))
}

fn demo_rotation() -> Vec<MapEntry> {
    [
        ("MP_Subway", "ConquestLarge0", "Operation Metro"),
        ("MP_001", "RushLarge0", "Grand Bazaar"),
        ("XP1_001", "ConquestAssaultLarge0", "Strike at Karkand"),
        ("XP1_002", "SquadDeathMatch0", "Gulf of Oman"),
        ("MP_012", "TeamDeathMatch0", "Operation Firestorm"),
    ]
    .into_iter()
    .enumerate()
    .map(|(index, (internal, mode, display))| MapEntry {
        index,
        internal_name: internal.to_string(),
        mode: mode.to_string(),
        display_name: display.to_string(),
    })
    .collect()
}
