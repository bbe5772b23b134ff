use std::time::{Duration, Instant};

use clap::Parser;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use rand::Rng;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use webtris::engine::{Action, Effect, Engine};
use webtris::protocol::{ClientMessage, MatchSettings, ServerMessage, StateUpdate};

/// Headless client that joins a match and plays randomly. Useful for
/// exercising a server and for filling out a room.
#[derive(Parser, Debug)]
struct Opts {
    /// Websocket address of the match server
    #[arg(long, default_value = "ws://127.0.0.1:9000")]
    server: String,
    /// Match to join or create
    #[arg(long, default_value = "autoplay")]
    match_id: String,
    #[arg(long, default_value = "bot")]
    username: String,
}

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

async fn send(tx: &mut WsSink, msg: &ClientMessage) -> anyhow::Result<()> {
    tx.send(Message::Text(serde_json::to_string(msg)?)).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let opts = Opts::parse();
    let (ws_stream, _) = connect_async(opts.server.as_str()).await?;
    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    // the server assigns our id in its first message
    let player = loop {
        let msg = ws_rx
            .next()
            .await
            .ok_or_else(|| anyhow::anyhow!("server closed before welcome"))??;
        if let Message::Text(t) = msg {
            if let Ok(ServerMessage::Welcome { player }) = serde_json::from_str(&t) {
                break player;
            }
        }
    };
    println!("Connected as {}", player);

    send(
        &mut ws_tx,
        &ClientMessage::Join {
            player: player.clone(),
            match_id: opts.match_id.clone(),
            username: opts.username.clone(),
        },
    )
    .await?;
    send(&mut ws_tx, &ClientMessage::JoinSocket {
        player: player.clone(),
    })
    .await?;

    let mut engine = Engine::new();
    let mut is_host = false;
    let started = Instant::now();
    let mut ticker = tokio::time::interval(Duration::from_millis(16));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = started.elapsed().as_millis() as u64;
                if engine.queue_len() > 0 && rand::thread_rng().gen_bool(0.08) {
                    let action = match rand::thread_rng().gen_range(0..5) {
                        0 => Action::Left,
                        1 => Action::Right,
                        2 => Action::RotateCw,
                        3 => Action::RotateCcw,
                        _ => Action::HardDrop,
                    };
                    engine.apply(action, true, now);
                }
                engine.tick(now);
                for effect in engine.drain_effects() {
                    match effect {
                        Effect::RequestBag => {
                            send(&mut ws_tx, &ClientMessage::Bag {
                                player: player.clone(),
                            })
                            .await?;
                        }
                        Effect::PushState { board, lost } => {
                            if lost {
                                println!(
                                    "Topped out after {} pieces ({:.2} pps)",
                                    engine.locks(),
                                    engine.pps(now)
                                );
                            }
                            send(&mut ws_tx, &ClientMessage::Update {
                                player: player.clone(),
                                update: StateUpdate::Match { board, lost },
                            })
                            .await?;
                        }
                    }
                }
            }
            msg = ws_rx.next() => {
                let Some(msg) = msg else { break };
                let Message::Text(t) = msg? else { continue };
                let now = started.elapsed().as_millis() as u64;
                match serde_json::from_str::<ServerMessage>(&t) {
                    Ok(ServerMessage::Joined { is_host: host }) => {
                        is_host = host;
                        if is_host {
                            send(&mut ws_tx, &ClientMessage::Start {
                                player: player.clone(),
                                settings: MatchSettings::default(),
                            })
                            .await?;
                        }
                    }
                    Ok(ServerMessage::Start { settings }) => {
                        println!("Match started");
                        engine.start(settings, now);
                    }
                    Ok(ServerMessage::Bag { bag }) => engine.push_bag(bag),
                    Ok(ServerMessage::Pause { paused }) => engine.pause(paused, now),
                    Ok(ServerMessage::Reset) => {
                        println!("Match reset");
                        engine.stop();
                        if is_host {
                            send(&mut ws_tx, &ClientMessage::Start {
                                player: player.clone(),
                                settings: MatchSettings::default(),
                            })
                            .await?;
                        }
                    }
                    Ok(ServerMessage::Update { event }) => {
                        if matches!(event, webtris::protocol::UpdateEvent::GiveHost) {
                            is_host = true;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => eprintln!("bad server message: {}", e),
                }
            }
        }
    }
    println!("Server closed the connection");
    Ok(())
}
