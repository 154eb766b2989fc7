//! WebSocket wire events
//!
//! Every frame is a JSON object tagged by `event`. Client frames carry
//! microphone audio and control; server frames carry transcripts, agent
//! text, synthesized audio, and errors. Unknown client event names fail
//! deserialization and are dropped by the reader.

use crate::providers::AudioFormat;
use serde::{Deserialize, Serialize};

/// Frames the browser sends.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// One chunk of microphone PCM, base64-encoded s16le mono 16 kHz.
    Audio { data: String },
    Ping,
    /// The user started talking over playback.
    StopSpeaking,
}

/// Frames the server sends.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ServerEvent {
    Pong,
    Transcript {
        text: String,
        #[serde(rename = "isFinal")]
        is_final: bool,
    },
    AgentResponse {
        text: String,
    },
    /// One synthesized reply, base64-encoded in the named container.
    Audio {
        audio: String,
        format: AudioFormat,
    },
    /// Instructs the client to halt playback immediately.
    StopAudio,
    Error {
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_event_wire_shapes() {
        let audio: ClientEvent =
            serde_json::from_value(json!({"event": "audio", "data": "AAAA"})).unwrap();
        assert_eq!(
            audio,
            ClientEvent::Audio {
                data: "AAAA".to_string()
            }
        );

        let ping: ClientEvent = serde_json::from_value(json!({"event": "ping"})).unwrap();
        assert_eq!(ping, ClientEvent::Ping);

        let stop: ClientEvent =
            serde_json::from_value(json!({"event": "stop-speaking"})).unwrap();
        assert_eq!(stop, ClientEvent::StopSpeaking);

        assert!(serde_json::from_value::<ClientEvent>(json!({"event": "mystery"})).is_err());
    }

    #[test]
    fn test_server_event_wire_shapes() {
        let transcript = serde_json::to_value(ServerEvent::Transcript {
            text: "hello".to_string(),
            is_final: true,
        })
        .unwrap();
        assert_eq!(
            transcript,
            json!({"event": "transcript", "text": "hello", "isFinal": true})
        );

        let audio = serde_json::to_value(ServerEvent::Audio {
            audio: "AAAA".to_string(),
            format: AudioFormat::Mp3,
        })
        .unwrap();
        assert_eq!(
            audio,
            json!({"event": "audio", "audio": "AAAA", "format": "mp3"})
        );

        let stop = serde_json::to_value(ServerEvent::StopAudio).unwrap();
        assert_eq!(stop, json!({"event": "stop-audio"}));

        let response = serde_json::to_value(ServerEvent::AgentResponse {
            text: "hi".to_string(),
        })
        .unwrap();
        assert_eq!(response, json!({"event": "agent-response", "text": "hi"}));

        let error = serde_json::to_value(ServerEvent::Error {
            message: "nope".to_string(),
        })
        .unwrap();
        assert_eq!(error, json!({"event": "error", "message": "nope"}));

        let pong = serde_json::to_value(ServerEvent::Pong).unwrap();
        assert_eq!(pong, json!({"event": "pong"}));
    }
}
