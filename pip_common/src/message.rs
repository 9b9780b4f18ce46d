//! Wire messages pushed to subscribers.
//!
//! Two channels exist. The speech channel carries `SpeechMessage` objects in the
//! shape an avatar front-end consumes directly:
//!
//! ```json
//! {"text": "USDJPY が 5.5 pips 上昇 しました\n...", "role": "assistant", "emotion": "happy", "type": "message"}
//! ```
//!
//! The dashboard channel carries `DashboardMessage` values tagged by `type`
//! (`init` on connect, `price_update` for every sample).
//!
//! All messages are encoded with `serde_json`, which leaves non-ASCII text unescaped.
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::error::PipError;

/// Emotion tags understood by the avatar front-end.
#[allow(missing_docs)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Emotion {
    Neutral,
    Happy,
    Sad,
    Angry,
    Relaxed,
    Surprised,
}

/// Speaker of a speech message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    /// The avatar persona itself.
    Assistant,
    /// Service announcements (greeting, startup).
    System,
}

/// Literal `"type"` field of a speech message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// The only kind the speech channel emits.
    Message,
}

/// Notification sent verbatim to every speech subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechMessage {
    /// Human-readable text, spoken by the avatar.
    pub text: String,
    /// Who is speaking.
    pub role: Role,
    /// Emotion the avatar should display.
    pub emotion: Emotion,
    /// Always `"message"`.
    #[serde(rename = "type")]
    pub kind: MessageKind,
}

impl SpeechMessage {
    /// Message spoken by the avatar persona.
    pub fn assistant(text: impl Into<String>, emotion: Emotion) -> Self {
        Self {
            text: text.into(),
            role: Role::Assistant,
            emotion,
            kind: MessageKind::Message,
        }
    }

    /// Service announcement.
    pub fn system(text: impl Into<String>, emotion: Emotion) -> Self {
        Self {
            text: text.into(),
            role: Role::System,
            emotion,
            kind: MessageKind::Message,
        }
    }

    /// Encode to the JSON text frame sent on the wire.
    pub fn to_json(&self) -> Result<String, PipError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Published view of one instrument, as shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolStatus {
    /// Instrument symbol.
    pub symbol: String,
    /// Optional spoken reading of the symbol (`jp_name` on the wire).
    #[serde(rename = "jp_name", alias = "reading")]
    pub reading: Option<String>,
    /// Latest sampled bid, if any.
    pub price: Option<f64>,
    /// Current baseline, if any.
    pub base_price: Option<f64>,
}

/// Messages on the dashboard channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DashboardMessage {
    /// Sent once when a dashboard connects.
    Init {
        /// Snapshot of the running settings.
        config: serde_json::Value,
        /// Per-instrument status.
        status: Vec<SymbolStatus>,
    },
    /// Sent for every sample taken.
    PriceUpdate {
        /// Instrument symbol.
        symbol: String,
        /// Optional spoken reading (`jp_name` on the wire).
        #[serde(rename = "jp_name", alias = "reading")]
        reading: Option<String>,
        /// Sampled bid.
        price: f64,
        /// Baseline the sample was compared against.
        base_price: f64,
        /// Absolute movement against the baseline, in pips.
        pips_change: f64,
    },
}

impl DashboardMessage {
    /// Encode to the JSON text frame sent on the wire.
    pub fn to_json(&self) -> Result<String, PipError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speech_message_matches_wire_shape() {
        let msg = SpeechMessage::assistant("USDJPY が 5.5 pips 上昇 しました\nすこし", Emotion::Happy);
        let json = msg.to_json().unwrap();
        assert_eq!(
            json,
            r#"{"text":"USDJPY が 5.5 pips 上昇 しました\nすこし","role":"assistant","emotion":"happy","type":"message"}"#
        );
    }

    #[test]
    fn system_message_decodes() {
        let raw = r#"{"text":"hi","role":"system","emotion":"surprised","type":"message"}"#;
        let msg: SpeechMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(msg, SpeechMessage::system("hi", Emotion::Surprised));
    }

    #[test]
    fn dashboard_update_is_tagged() {
        let msg = DashboardMessage::PriceUpdate {
            symbol: "EURUSD".into(),
            reading: None,
            price: 1.1,
            base_price: 1.1,
            pips_change: 0.0,
        };
        let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "price_update");
        assert_eq!(value["symbol"], "EURUSD");
    }

    #[test]
    fn reading_travels_as_jp_name() {
        let update = DashboardMessage::PriceUpdate {
            symbol: "USDJPY".into(),
            reading: Some("どるえん".into()),
            price: 150.0,
            base_price: 150.0,
            pips_change: 0.0,
        };
        let value: serde_json::Value = serde_json::from_str(&update.to_json().unwrap()).unwrap();
        assert_eq!(value["jp_name"], "どるえん");
        assert!(value.get("reading").is_none());

        let status = SymbolStatus {
            symbol: "USDJPY".into(),
            reading: Some("どるえん".into()),
            price: None,
            base_price: None,
        };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["jp_name"], "どるえん");

        let raw = r#"{"symbol":"EURUSD","reading":"ゆーろどる","price":null,"base_price":null}"#;
        let decoded: SymbolStatus = serde_json::from_str(raw).unwrap();
        assert_eq!(decoded.reading.as_deref(), Some("ゆーろどる"));
    }

    #[test]
    fn emotion_parses_case_insensitively() {
        assert_eq!("Surprised".parse::<Emotion>().unwrap(), Emotion::Surprised);
        assert_eq!(Emotion::Relaxed.to_string(), "relaxed");
    }
}
