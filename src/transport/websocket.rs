use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::spawn;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async_with_config;
use tracing::{debug, error, info, warn};
use tungstenite::protocol::Message as WsMessage;
use tungstenite::protocol::WebSocketConfig;

use crate::client::Client;
use crate::config::Settings;
use crate::transport::handler::{ConnectionSlot, Flow, ServerState};
use crate::utils::ServerError;

/// Binds the configured address and serves connections until the task is dropped.
pub async fn start_websocket_server(settings: &Settings, state: Arc<ServerState>) -> Result<(), ServerError> {
    let addr = settings.bind_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("WebSocket server listening on ws://{}", addr);
    serve(listener, state).await
}

/// Accept loop over an already bound listener.
pub async fn serve(listener: TcpListener, state: Arc<ServerState>) -> Result<(), ServerError> {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "accept failed");
                continue;
            }
        };

        let Some(slot) = state.try_reserve_connection() else {
            warn!(%peer, limit = state.max_connections, "connection limit reached, refusing");
            drop(stream);
            continue;
        };

        let state = Arc::clone(&state);
        spawn(async move {
            handle_connection(stream, state, slot).await;
            debug!(%peer, "connection task finished");
        });
    }
}

async fn handle_connection(stream: TcpStream, state: Arc<ServerState>, _slot: ConnectionSlot) {
    let config = WebSocketConfig::default().max_message_size(Some(state.max_frame_len));
    let ws_stream = match accept_async_with_config(stream, Some(config)).await {
        Ok(ws) => ws,
        Err(e) => {
            error!("WebSocket handshake error: {}", e);
            return;
        }
    };

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
    let client = Client::new(tx);

    let session_id = state.sessions.accept(Arc::new(client.clone()));
    if let Err(e) = state.sessions.mark_connected(&session_id) {
        error!(session = %session_id, error = %e, "cannot open session");
        state.sessions.disconnect(&session_id);
        return;
    }
    info!(session = %session_id, connection = %client.id, "client connected");

    let cleanup_called = Arc::new(AtomicBool::new(false));
    let cleanup = {
        let state = Arc::clone(&state);
        let session_id = session_id.clone();
        let cleanup_called = Arc::clone(&cleanup_called);
        move || {
            if !cleanup_called.swap(true, Ordering::SeqCst) {
                state.sessions.disconnect(&session_id);
                info!(session = %session_id, "client disconnected");
            }
        }
    };

    // Writer: drains the session's channel onto the socket.
    let writer_cleanup = cleanup.clone();
    let writer_id = session_id.clone();
    let writer = spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, WsMessage::Close(_));
            if let Err(e) = ws_sender.send(msg).await {
                warn!(session = %writer_id, error = %e, "failed to write to client");
                break;
            }
            if closing {
                break;
            }
        }
        writer_cleanup();
        debug!(session = %writer_id, "send loop closed");
    });

    while let Some(msg) = ws_receiver.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                warn!(session = %session_id, error = %e, "read error");
                break;
            }
        };
        match msg {
            WsMessage::Binary(frame) => {
                if state.handle_frame(&session_id, frame) == Flow::Close {
                    client.close();
                    break;
                }
            }
            WsMessage::Text(_) => {
                warn!(session = %session_id, "text frames are not supported, ignoring");
            }
            WsMessage::Close(_) => break,
            _ => {}
        }
    }

    // Disconnect drops the session's sink; with `client` gone the writer sees
    // the channel close.
    cleanup();
    drop(client);
    if let Err(e) = writer.await {
        warn!(session = %session_id, error = %e, "writer task failed");
    }
}
