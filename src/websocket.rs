use log::{error, info, warn};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tungstenite::{Message, accept};

use crate::state::LevelReport;

const PUSH_INTERVAL_MS: u64 = 40;

/// Serves the latest report as JSON to every connected WebSocket client.
///
/// A client is sent each report once, when its sequence number changes.
pub fn websocket_thread(addr: String, latest: Arc<Mutex<Option<LevelReport>>>) {
    let server = match TcpListener::bind(&addr) {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to bind WebSocket server on {}: {}", addr, e);
            return;
        }
    };
    info!("WebSocket server listening on {}", addr);

    for stream in server.incoming() {
        let stream = match stream {
            Ok(s) => s,
            Err(e) => {
                warn!("Connection error: {}", e);
                continue;
            }
        };

        let latest = Arc::clone(&latest);
        thread::spawn(move || {
            let mut websocket = match accept(stream) {
                Ok(ws) => ws,
                Err(e) => {
                    warn!("WebSocket handshake error: {}", e);
                    return;
                }
            };

            info!("New WebSocket client connected");
            let mut last_sent = None;

            loop {
                let report = match latest.lock() {
                    Ok(locked) => locked.clone(),
                    Err(_) => {
                        error!("Level state lock poisoned, closing client");
                        break;
                    }
                };

                if let Some(r) = report.filter(|r| last_sent != Some(r.sequence)) {
                    match serde_json::to_string(&r) {
                        Ok(json) => {
                            if websocket.send(Message::Text(json)).is_err() {
                                info!("WebSocket client disconnected");
                                break;
                            }
                            last_sent = Some(r.sequence);
                        }
                        Err(e) => error!("JSON serialization error: {}", e),
                    }
                }

                thread::sleep(Duration::from_millis(PUSH_INTERVAL_MS));
            }
        });
    }
}
