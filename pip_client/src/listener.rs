//! Receiving notifications from the pip notifier.
//!
//! `Listener` reads text frames from an open WebSocket, logs a one-line summary of
//! each, and sends a `Ping` frame every `ping_every` to keep idle proxies from
//! closing the connection.
use log::{debug, info, warn};
use pip_common::message::DashboardMessage;
use pip_common::{Result, SpeechMessage};
use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tungstenite::{Message, WebSocket};

/// Receive loop over an established WebSocket.
pub struct Listener<S: Read + Write> {
    socket: WebSocket<S>,
    ping_every: Duration,
    last_ping: Instant,
}

impl<S: Read + Write> Listener<S> {
    /// Wrap `socket`. The underlying stream should have a read timeout so the loop
    /// can notice shutdown and send pings while idle.
    pub fn new(socket: WebSocket<S>, ping_every: Duration) -> Self {
        Self {
            socket,
            ping_every,
            last_ping: Instant::now(),
        }
    }

    /// Read and log messages until `shutdown` is set or the server closes.
    pub fn run(mut self, shutdown: &AtomicBool) -> Result<()> {
        while !shutdown.load(Ordering::Relaxed) {
            if self.last_ping.elapsed() >= self.ping_every {
                self.socket.send(Message::Ping(Default::default()))?;
                debug!("PING sent");
                self.last_ping = Instant::now();
            }

            match self.socket.read() {
                Ok(Message::Text(text)) => info!("{}", describe(text.as_str())),
                Ok(Message::Close(frame)) => {
                    info!("Server closed the connection: {:?}", frame);
                    return Ok(());
                }
                Ok(Message::Pong(_)) => debug!("PONG received"),
                Ok(_) => {}
                Err(tungstenite::Error::Io(e))
                    if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    continue;
                }
                Err(tungstenite::Error::ConnectionClosed) => return Ok(()),
                Err(e) => {
                    warn!("Receive error: {}", e);
                    return Err(e.into());
                }
            }
        }

        info!("Listener stopping...");
        let _ = self.socket.close(None);
        let _ = self.socket.flush();
        Ok(())
    }
}

/// One-line summary of a frame from either channel.
pub fn describe(raw: &str) -> String {
    if let Ok(message) = serde_json::from_str::<SpeechMessage>(raw) {
        return format!(
            "[{}/{}] {}",
            message.role,
            message.emotion,
            message.text.replace('\n', " / ")
        );
    }
    match serde_json::from_str::<DashboardMessage>(raw) {
        Ok(DashboardMessage::Init { status, .. }) => {
            format!("dashboard: watching {} instruments", status.len())
        }
        Ok(DashboardMessage::PriceUpdate {
            symbol,
            price,
            base_price,
            pips_change,
            ..
        }) => format!(
            "{} {} (base {}, {:.1} pips)",
            symbol, price, base_price, pips_change
        ),
        Err(_) => format!("unrecognized frame: {}", raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pip_common::Emotion;

    #[test]
    fn describes_speech_messages_on_one_line() {
        let raw = SpeechMessage::assistant(
            "USDJPY が 5.5 pips 上昇 しました\n📊 すこしのうごきがありましたです",
            Emotion::Happy,
        )
        .to_json()
        .unwrap();
        assert_eq!(
            describe(&raw),
            "[assistant/happy] USDJPY が 5.5 pips 上昇 しました / 📊 すこしのうごきがありましたです"
        );
    }

    #[test]
    fn describes_dashboard_messages() {
        let update = DashboardMessage::PriceUpdate {
            symbol: "EURUSD".into(),
            reading: None,
            price: 1.0997,
            base_price: 1.1,
            pips_change: 3.0,
        }
        .to_json()
        .unwrap();
        assert_eq!(describe(&update), "EURUSD 1.0997 (base 1.1, 3.0 pips)");

        let init = r#"{"type":"init","config":{},"status":[{"symbol":"USDJPY","jp_name":null,"price":null,"base_price":null}]}"#;
        assert_eq!(describe(init), "dashboard: watching 1 instruments");
    }

    #[test]
    fn unknown_frames_are_echoed() {
        assert_eq!(describe("hello"), "unrecognized frame: hello");
    }
}
