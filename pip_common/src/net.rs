//! Shared networking constants and helpers used by server and client.

/// Default bind host for the subscriber transport.
pub const DEFAULT_HOST: &str = "0.0.0.0";
/// Default WebSocket port.
pub const DEFAULT_PORT: u16 = 8000;

/// Request paths that join the speech (avatar) channel.
pub const SPEECH_PATHS: [&str; 3] = ["/", "/direct-speech", "/direct"];
/// Request path that joins the dashboard channel.
pub const DASHBOARD_PATH: &str = "/dashboard";

/// Helper to format an address with a port like "ip:port".
pub fn addr(ip: &str, port: u16) -> String {
    format!("{}:{}", ip, port)
}

/// Channel a connection belongs to, chosen by its request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Avatar-facing notifications.
    Speech,
    /// Per-sample status stream.
    Dashboard,
}

impl Channel {
    /// Resolve a request path (query string ignored) to a channel.
    pub fn from_path(path: &str) -> Option<Self> {
        let path = path.split('?').next().unwrap_or(path);
        if SPEECH_PATHS.contains(&path) {
            Some(Channel::Speech)
        } else if path == DASHBOARD_PATH {
            Some(Channel::Dashboard)
        } else {
            None
        }
    }
}
