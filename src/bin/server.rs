use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use clap::Parser;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Mutex;
use tokio_tungstenite::{accept_async, tungstenite::Message};

use webtris::matchmaker::Matchmaker;
use webtris::protocol::{ClientMessage, ServerMessage};

/// Multiplayer match server: speaks JSON over websockets and keeps every
/// match and player in memory.
#[derive(Parser, Debug)]
struct Opts {
    /// Address to listen for websocket connections (clients connect here)
    #[arg(long, default_value = "127.0.0.1:9000")]
    listen: String,
}

static NEXT_PLAYER: AtomicU64 = AtomicU64::new(1);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let opts = Opts::parse();
    let listener = TcpListener::bind(&opts.listen).await?;
    println!("Match server listening on ws://{}", opts.listen);

    let matchmaker = Arc::new(Mutex::new(Matchmaker::new()));

    loop {
        let (stream, addr) = listener.accept().await?;
        let player = format!("player-{}", NEXT_PLAYER.fetch_add(1, Ordering::Relaxed));
        println!("WS connected: {} as {}", addr, player);
        let matchmaker = matchmaker.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_conn(stream, &matchmaker, &player).await {
                eprintln!("connection error {}: {:?}", addr, e);
            }
            matchmaker.lock().await.disconnect(&player);
            println!("WS closed: {}", player);
        });
    }
}

async fn handle_conn(
    stream: TcpStream,
    matchmaker: &Arc<Mutex<Matchmaker>>,
    player: &str,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream).await?;
    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    // All outbound traffic, replies and room broadcasts alike, funnels
    // through one queue so the client sees a single ordered stream.
    let (out_tx, mut out_rx) = tokio::sync::mpsc::unbounded_channel::<ServerMessage>();
    out_tx
        .send(ServerMessage::Welcome {
            player: player.to_string(),
        })
        .ok();

    loop {
        tokio::select! {
            Some(msg) = out_rx.recv() => {
                ws_tx.send(Message::Text(serde_json::to_string(&msg)?)).await?;
            }
            Some(msg) = ws_rx.next() => {
                match msg? {
                    Message::Text(t) => {
                        let reply = match serde_json::from_str::<ClientMessage>(&t) {
                            Ok(msg) => dispatch(matchmaker, msg, &out_tx).await,
                            Err(e) => {
                                eprintln!("bad message from {}: {}", player, e);
                                Some(ServerMessage::ok())
                            }
                        };
                        if let Some(reply) = reply {
                            out_tx.send(reply).ok();
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            else => break,
        }
    }
    Ok(())
}

/// Route one client message into the matchmaker, returning the direct
/// reply. Room events reach this client through its outbound queue.
async fn dispatch(
    matchmaker: &Arc<Mutex<Matchmaker>>,
    msg: ClientMessage,
    conn: &UnboundedSender<ServerMessage>,
) -> Option<ServerMessage> {
    let mut mm = matchmaker.lock().await;
    match msg {
        ClientMessage::Join {
            player,
            match_id,
            username,
        } => {
            let is_host = mm.join(&player, &match_id, &username);
            println!(
                "{} ({}) joined match {} (host: {})",
                username, player, match_id, is_host
            );
            Some(ServerMessage::Joined { is_host })
        }
        ClientMessage::Bag { player } => match mm.request_bag(&player) {
            Some(bag) => Some(ServerMessage::Bag { bag }),
            None => Some(ServerMessage::ok()),
        },
        ClientMessage::Update { player, update } => {
            mm.update_state(&player, update);
            Some(ServerMessage::ok())
        }
        ClientMessage::Start { player, settings } => {
            mm.start_match(&player, settings);
            Some(ServerMessage::ok())
        }
        ClientMessage::Pause { player } => {
            mm.pause_match(&player);
            Some(ServerMessage::ok())
        }
        ClientMessage::JoinSocket { player } => {
            mm.connect(&player, conn.clone());
            None
        }
    }
}
