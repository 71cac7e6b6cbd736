use fmtx_proto::protocol::{Broadcast, Command, Message, PROTOCOL_VERSION};
use fmtx_proto::state::SessionStateManager;
use fmtx_session::events::{intent_for, SessionEvent, SessionMessage};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};

pub fn start_server(
    bind_address: String,
    port: u16,
    states: Arc<SessionStateManager>,
    event_tx: mpsc::UnboundedSender<SessionEvent>,
    broadcast_tx: broadcast::Sender<SessionMessage>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let addr = format!("{}:{}", bind_address, port);

        let listener = match TcpListener::bind(&addr).await {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to bind TCP socket {}: {}", addr, e);
                return;
            }
        };

        info!("TCP server listening at {}", addr);

        let mut client_id = 0usize;

        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    client_id += 1;
                    let id = client_id;
                    info!("Client {} connected from {}", id, peer);

                    let states = states.clone();
                    let evt_tx = event_tx.clone();
                    let bcast_rx = broadcast_tx.subscribe();

                    tokio::spawn(async move {
                        handle_client(stream, states, id, evt_tx, bcast_rx).await;
                        info!("Client {} disconnected", id);
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    })
}

async fn handle_client(
    stream: TcpStream,
    states: Arc<SessionStateManager>,
    client_id: usize,
    event_tx: mpsc::UnboundedSender<SessionEvent>,
    mut broadcast_rx: broadcast::Receiver<SessionMessage>,
) {
    let (mut read_half, mut write_half) = stream.into_split();
    let mut tmp = [0u8; 4096];
    let mut read_buf: Vec<u8> = Vec::new();

    // Send Hello with current state snapshot on connect
    if let Ok(encoded) = encode_hello(&states).await {
        if write_half.write_all(&encoded).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            result = read_half.read(&mut tmp) => {
                match result {
                    Ok(0) => {
                        info!("Client {} closed connection", client_id);
                        break;
                    }
                    Ok(n) => {
                        read_buf.extend_from_slice(&tmp[..n]);

                        loop {
                            if read_buf.len() < 4 { break; }
                            match Message::decode(&read_buf) {
                                Ok((Message::Command(cmd), consumed)) => {
                                    read_buf.drain(..consumed);
                                    info!("Client {} sent command: {:?}", client_id, cmd);

                                    match intent_for(&cmd) {
                                        Some(intent) => {
                                            if event_tx.send(SessionEvent::Intent(intent)).is_err() {
                                                warn!("Session event channel closed");
                                                return;
                                            }
                                        }
                                        // GetState is answered inline below.
                                        None => debug_assert!(matches!(cmd, Command::GetState)),
                                    }

                                    if let Ok(encoded) = encode_state(&states).await {
                                        if write_half.write_all(&encoded).await.is_err() {
                                            return;
                                        }
                                    }
                                }
                                Ok((_, consumed)) => {
                                    read_buf.drain(..consumed);
                                }
                                Err(_) => break,
                            }
                        }
                    }
                    Err(e) => {
                        error!("Read error from client {}: {}", client_id, e);
                        break;
                    }
                }
            }

            msg = broadcast_rx.recv() => {
                match msg {
                    Ok(SessionMessage::StateUpdated) => {
                        if let Ok(encoded) = encode_state(&states).await {
                            if write_half.write_all(&encoded).await.is_err() {
                                break;
                            }
                        }
                    }
                    Ok(SessionMessage::WakePulse) => {
                        if let Ok(encoded) = Message::Broadcast(Broadcast::Wake).encode() {
                            let _ = write_half.write_all(&encoded).await;
                        }
                    }
                    Ok(SessionMessage::Log(message)) => {
                        let broadcast = Broadcast::Log { message };
                        if let Ok(encoded) = Message::Broadcast(broadcast).encode() {
                            let _ = write_half.write_all(&encoded).await;
                        }
                    }
                    Ok(SessionMessage::Degraded(message)) => {
                        let broadcast = Broadcast::Degraded { message };
                        if let Ok(encoded) = Message::Broadcast(broadcast).encode() {
                            let _ = write_half.write_all(&encoded).await;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Client {} missed {} broadcast messages", client_id, n);
                        if let Ok(encoded) = encode_state(&states).await {
                            let _ = write_half.write_all(&encoded).await;
                        }
                    }
                    Err(_) => break,
                }
            }
        }
    }
}

async fn encode_hello(states: &SessionStateManager) -> anyhow::Result<Vec<u8>> {
    let state = states.snapshot().await;
    let rev = state.rev;
    Message::Broadcast(Broadcast::Hello {
        protocol_version: PROTOCOL_VERSION,
        session_rev: rev,
        state,
    })
    .encode()
}

async fn encode_state(states: &SessionStateManager) -> anyhow::Result<Vec<u8>> {
    let state = states.snapshot().await;
    Message::Broadcast(Broadcast::State { data: state }).encode()
}
