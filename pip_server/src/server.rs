//! WebSocket front door.
//!
//! `SubscriberServer` accepts TCP connections and performs the WebSocket handshake
//! on a thread per connection. The request path picks the channel:
//! `/`, `/direct-speech` and `/direct` join the speech channel, `/dashboard` joins the
//! dashboard channel, and anything else is refused with `404 Not Found` during the
//! handshake. A speech subscriber is greeted and a dashboard subscriber receives an
//! `init` snapshot before either is handed to its broadcaster.
use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, error, info, warn};
use pip_common::message::{DashboardMessage, Emotion, SpeechMessage};
use pip_common::net::Channel;
use pip_common::{PipError, Result};
use tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tungstenite::http::StatusCode;
use tungstenite::{Message, WebSocket};

use crate::broadcaster::{Broadcaster, Connection};
use crate::config::Settings;
use crate::status::StatusBoard;

/// Text sent to every speech subscriber on connect.
pub const GREETING: &str = "MT5 FX価格監視システムに接続しました";

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
const INBOUND_POLL: Duration = Duration::from_millis(20);

/// A subscriber connected over WebSocket.
pub struct WsConnection {
    peer: String,
    socket: WebSocket<TcpStream>,
}

impl Connection for WsConnection {
    fn peer(&self) -> String {
        self.peer.clone()
    }

    fn send_text(&mut self, text: &str) -> Result<()> {
        self.socket.send(Message::text(text))?;
        Ok(())
    }

    fn poll_inbound(&mut self) -> Result<()> {
        match self.socket.read() {
            Ok(Message::Close(_)) => Err(PipError::Disconnected(self.peer.clone())),
            Ok(Message::Ping(_)) => {
                // Pong is queued by tungstenite; push it out now.
                self.socket.flush()?;
                Ok(())
            }
            Ok(_) => Ok(()),
            Err(tungstenite::Error::Io(e))
                if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
            {
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn close(&mut self) {
        let _ = self.socket.close(None);
        let _ = self.socket.flush();
    }
}

#[derive(Clone)]
struct ConnectionHandler {
    speech: Broadcaster,
    dashboard: Broadcaster,
    board: StatusBoard,
    config: Arc<serde_json::Value>,
    send_timeout: Duration,
}

impl ConnectionHandler {
    fn handle(&self, stream: TcpStream) -> Result<()> {
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT))?;

        let mut channel = None;
        let socket = tungstenite::accept_hdr(stream, |req: &Request, resp: Response| {
            let path = req.uri().path();
            match Channel::from_path(path) {
                Some(found) => {
                    channel = Some(found);
                    Ok(resp)
                }
                None => Err(not_found(path)),
            }
        })
        .map_err(|e| PipError::Disconnected(format!("{}: handshake failed: {}", peer, e)))?;
        let channel = channel.ok_or_else(|| PipError::Disconnected(peer.clone()))?;

        socket.get_ref().set_read_timeout(Some(INBOUND_POLL))?;
        socket.get_ref().set_write_timeout(Some(self.send_timeout))?;
        let mut conn = WsConnection {
            peer: peer.clone(),
            socket,
        };

        match channel {
            Channel::Speech => {
                let greeting = SpeechMessage::system(GREETING, Emotion::Happy).to_json()?;
                conn.send_text(&greeting)?;
                self.speech.register(Box::new(conn))?;
            }
            Channel::Dashboard => {
                let init = DashboardMessage::Init {
                    config: (*self.config).clone(),
                    status: self.board.snapshot(),
                }
                .to_json()?;
                conn.send_text(&init)?;
                self.dashboard.register(Box::new(conn))?;
            }
        }
        debug!("{} joined {:?}", peer, channel);
        Ok(())
    }
}

fn not_found(path: &str) -> ErrorResponse {
    let mut resp = ErrorResponse::new(Some(format!("no channel at {}", path)));
    *resp.status_mut() = StatusCode::NOT_FOUND;
    resp
}

/// Listening socket plus everything a new connection needs.
pub struct SubscriberServer {
    listener: TcpListener,
    handler: ConnectionHandler,
}

impl SubscriberServer {
    /// Bind the listener on the configured host and port.
    pub fn bind(
        settings: &Settings,
        speech: Broadcaster,
        dashboard: Broadcaster,
        board: StatusBoard,
    ) -> Result<Self> {
        let addr = settings.transport.bind_addr();
        let listener = TcpListener::bind(&addr).map_err(|source| PipError::TransportBind {
            addr: addr.clone(),
            source,
        })?;
        info!("WebSocket server listening on ws://{}", listener.local_addr()?);

        Ok(Self {
            listener,
            handler: ConnectionHandler {
                speech,
                dashboard,
                board,
                config: Arc::new(settings.to_value()?),
                send_timeout: settings.transport.send_timeout(),
            },
        })
    }

    /// Address actually bound (useful with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections forever, one handshake thread per connection.
    ///
    /// A failing connection only affects itself.
    pub fn accept_loop(self) {
        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => {
                    let handler = self.handler.clone();
                    thread::spawn(move || {
                        if let Err(e) = handler.handle(stream) {
                            warn!("Connection rejected: {}", e);
                        }
                    });
                }
                Err(e) => error!("TCP connection error: {}", e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tungstenite::stream::MaybeTlsStream;

    fn start() -> (SocketAddr, Broadcaster, Broadcaster) {
        let mut settings = Settings::default();
        settings.transport.host = "127.0.0.1".to_string();
        settings.transport.port = 0;

        let speech = Broadcaster::from_transport("speech", &settings.transport);
        let dashboard = Broadcaster::from_transport("dashboard", &settings.transport);
        let board = StatusBoard::new(&settings.instrument_configs());
        let server =
            SubscriberServer::bind(&settings, speech.clone(), dashboard.clone(), board).unwrap();
        let addr = server.local_addr().unwrap();
        thread::spawn(move || server.accept_loop());
        (addr, speech, dashboard)
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(3);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        condition()
    }

    fn read_text(client: &mut WebSocket<MaybeTlsStream<TcpStream>>) -> String {
        loop {
            match client.read().unwrap() {
                Message::Text(text) => return text.as_str().to_string(),
                _ => continue,
            }
        }
    }

    #[test]
    fn speech_subscriber_is_greeted_then_receives_broadcasts() {
        let (addr, speech, _) = start();
        let (mut client, _) = tungstenite::connect(format!("ws://{}/", addr)).unwrap();

        let greeting: serde_json::Value = serde_json::from_str(&read_text(&mut client)).unwrap();
        assert_eq!(greeting["text"], "MT5 FX価格監視システムに接続しました");
        assert_eq!(greeting["role"], "system");
        assert_eq!(greeting["emotion"], "happy");

        assert!(wait_until(|| speech.subscriber_count() == 1));
        let report = speech.broadcast("{\"text\":\"hi\"}");
        assert_eq!(report.delivered, 1);
        assert_eq!(read_text(&mut client), "{\"text\":\"hi\"}");

        client.close(None).unwrap();
        let _ = client.flush();
        assert!(wait_until(|| speech.subscriber_count() == 0));
    }

    #[test]
    fn alternate_speech_paths_are_accepted() {
        let (addr, speech, _) = start();
        let (mut a, _) = tungstenite::connect(format!("ws://{}/direct-speech", addr)).unwrap();
        let (mut b, _) = tungstenite::connect(format!("ws://{}/direct", addr)).unwrap();
        read_text(&mut a);
        read_text(&mut b);
        assert!(wait_until(|| speech.subscriber_count() == 2));
    }

    #[test]
    fn dashboard_gets_init_snapshot() {
        let (addr, speech, dashboard) = start();
        let (mut client, _) = tungstenite::connect(format!("ws://{}/dashboard", addr)).unwrap();

        let init: serde_json::Value = serde_json::from_str(&read_text(&mut client)).unwrap();
        assert_eq!(init["type"], "init");
        assert_eq!(init["status"].as_array().unwrap().len(), 5);
        assert_eq!(init["config"]["thresholds"]["small"]["pips"], 5.0);
        let first = &init["status"][0];
        assert!(first.get("jp_name").is_some());
        assert!(first.get("reading").is_none());

        assert!(wait_until(|| dashboard.subscriber_count() == 1));
        assert_eq!(speech.subscriber_count(), 0);
    }

    #[test]
    fn unknown_path_is_refused() {
        let (addr, speech, dashboard) = start();
        match tungstenite::connect(format!("ws://{}/admin", addr)) {
            Err(tungstenite::Error::Http(resp)) => assert_eq!(resp.status(), StatusCode::NOT_FOUND),
            Err(other) => panic!("unexpected error {:?}", other),
            Ok(_) => panic!("handshake should fail"),
        }
        assert_eq!(speech.subscriber_count(), 0);
        assert_eq!(dashboard.subscriber_count(), 0);
    }

    #[test]
    fn occupied_port_is_a_bind_error() {
        let taken = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut settings = Settings::default();
        settings.transport.host = "127.0.0.1".to_string();
        settings.transport.port = taken.local_addr().unwrap().port();

        let hub = Broadcaster::from_transport("speech", &settings.transport);
        let board = StatusBoard::new(&settings.instrument_configs());
        let err = SubscriberServer::bind(&settings, hub.clone(), hub, board).err().unwrap();
        assert!(matches!(err, PipError::TransportBind { .. }));
    }
}
