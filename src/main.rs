//! CLI for Chatwire
//!
//! Subcommands:
//! - `server`: run the WebSocket server
//! - `client`: log in, join a room and send one message (useful for smoke tests)

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use chatwire::client::ChatClient;
use chatwire::config::load_config;
use chatwire::protocol::{MessageType, TypedPayload};
use chatwire::transport::{ServerState, StaticCredentials, start_websocket_server};
use chatwire::utils::logging;

#[derive(Parser)]
#[command(name = "chatwire")]
enum Command {
    /// Start the WebSocket server
    Server,
    /// Run the example client (connect, login, join a room, send text)
    Client {
        /// WebSocket server URL to connect to (default: ws://127.0.0.1:8080)
        #[arg(long, default_value = "ws://127.0.0.1:8080")]
        url: String,
        #[arg(long, default_value = "admin")]
        username: String,
        #[arg(long, default_value = "password")]
        password: String,
        #[arg(long, default_value = "general")]
        room: String,
    },
}

#[tokio::main]
async fn main() {
    let cmd = Command::parse();

    match cmd {
        Command::Server => {
            if let Err(e) = run_server().await {
                error!("Server failed: {}", e);
            }
        }
        Command::Client {
            url,
            username,
            password,
            room,
        } => {
            logging::init("info");
            if let Err(e) = run_client(&url, &username, &password, &room).await {
                error!("Client failed: {}", e);
            }
        }
    }
}

async fn run_server() -> Result<(), Box<dyn std::error::Error>> {
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            logging::init("info");
            return Err(e.into());
        }
    };
    logging::init(&config.logging.level);

    let credentials = StaticCredentials::from_settings(&config.auth);
    let state = Arc::new(ServerState::new(&config, Arc::new(credentials))?);

    // drains whatever embedding code queued on `state.scheduler`
    let tick = Duration::from_millis(config.scheduler.tick_millis);
    tokio::spawn(Arc::clone(&state.scheduler).run(tick, async {
        let _ = tokio::signal::ctrl_c().await;
    }));

    tokio::select! {
        result = start_websocket_server(&config, state) => {
            result?;
            error!("WebSocket server exited unexpectedly.");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    Ok(())
}

async fn run_client(url: &str, username: &str, password: &str, room: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut client = ChatClient::connect(url).await?;

    let login = client.login(username, password).await?;
    println!("Login response: success={} user={}", login.success, login.user_id);
    if !login.success {
        println!("Login failed: {}", login.error_message);
        return Ok(());
    }

    client.join_room(room).await?;
    let message_id = client.send_text(room, "Hello from chatwire").await?;
    println!("Sent message {message_id} to room {room}");

    // join ack, then the send ack
    let mut acks = 0;
    while acks < 2 {
        let Some(packet) = client.recv().await? else {
            break;
        };
        match packet.interpret() {
            Ok(TypedPayload::Ack(ack)) if packet.kind().ok() == Some(MessageType::Ack) => {
                println!("Ack for message {}: success={}", ack.acked_message_id, ack.success);
                acks += 1;
            }
            Ok(other) => println!("Incoming: {other:?}"),
            Err(e) => println!("Incoming undecodable payload: {e}"),
        }
    }

    client.close().await?;
    Ok(())
}
