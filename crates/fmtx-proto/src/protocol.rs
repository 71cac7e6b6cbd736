use serde::{Deserialize, Serialize};

use crate::state::SessionSnapshot;

/// Current protocol version.  Bump this when the wire format changes in a
/// breaking way.  Clients check this on connect and can refuse to talk to an
/// incompatible daemon.
pub const PROTOCOL_VERSION: u32 = 1;

/// Messages sent from a UI client to the session daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd")]
pub enum Command {
    PowerOn,
    PowerOff,
    Tune { khz: u32 },
    TunePreset { index: usize },
    StorePreset { index: usize },
    ClearPreset { index: usize },
    StepUp,
    StepDown,
    StartScan,
    CancelScan,
    RestoreDefaults,
    GetState,
}

/// Messages sent from the daemon to UI clients (broadcasts).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "broadcast")]
pub enum Broadcast {
    /// Sent immediately on connect: daemon version + full state snapshot.
    Hello {
        protocol_version: u32,
        session_rev: u64,
        state: SessionSnapshot,
    },
    State {
        data: SessionSnapshot,
    },
    Log {
        message: String,
    },
    /// A hand-wave wake gesture was recognised; the display should pulse.
    Wake,
    /// The hardware service could not be bound; the session is shutting down.
    Degraded {
        message: String,
    },
}

/// Wrapper for socket communication.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    Command(Command),
    Broadcast(Broadcast),
}

impl Message {
    pub fn encode(&self) -> anyhow::Result<Vec<u8>> {
        let json = serde_json::to_vec(self)?;
        let len = json.len() as u32;
        let mut result = Vec::with_capacity(4 + json.len());
        result.extend_from_slice(&len.to_be_bytes());
        result.extend_from_slice(&json);
        Ok(result)
    }

    pub fn decode(data: &[u8]) -> anyhow::Result<(Self, usize)> {
        if data.len() < 4 {
            anyhow::bail!("Insufficient data for length header");
        }
        let len = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
        if data.len() < 4 + len {
            anyhow::bail!("Insufficient data for message");
        }
        let msg: Self = serde_json::from_slice(&data[4..4 + len])?;
        Ok((msg, 4 + len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_encode_decode() {
        let msg = Message::Command(Command::Tune { khz: 98_100 });
        let encoded = msg.encode().unwrap();
        let (decoded, len) = Message::decode(&encoded).unwrap();
        assert_eq!(len, encoded.len());
        match decoded {
            Message::Command(Command::Tune { khz }) => assert_eq!(khz, 98_100),
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_hello_encode_decode() {
        let state = SessionSnapshot {
            rev: 42,
            ..Default::default()
        };
        let msg = Message::Broadcast(Broadcast::Hello {
            protocol_version: PROTOCOL_VERSION,
            session_rev: 42,
            state,
        });
        let encoded = msg.encode().unwrap();
        let (decoded, _) = Message::decode(&encoded).unwrap();
        match decoded {
            Message::Broadcast(Broadcast::Hello {
                protocol_version,
                session_rev,
                ..
            }) => {
                assert_eq!(protocol_version, PROTOCOL_VERSION);
                assert_eq!(session_rev, 42);
            }
            _ => panic!("Wrong message type"),
        }
    }
}
