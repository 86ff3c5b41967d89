//! Datagram-level encoding and decoding.
//!
//! One OSC message per UDP datagram. All bytes entering or leaving the
//! process pass through this module, which makes it the single place where
//! outbound text is normalized (run-code text has CRLF line endings folded
//! to LF so the server's reported line numbers stay meaningful regardless
//! of the editor's platform).

use rosc::{OscMessage, OscPacket};

use crate::message::{Incoming, Outgoing};

/// Errors raised while translating between datagram bytes and protocol
/// messages.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The datagram is not a well-formed OSC packet.
    #[error("malformed OSC datagram: {0:?}")]
    Malformed(rosc::OscError),

    /// The protocol uses plain messages; bundles are not part of it.
    #[error("OSC bundles are not part of the protocol")]
    UnsupportedBundle,

    /// The address is not in the protocol table.
    #[error("unknown address {0}")]
    UnknownAddress(String),

    /// The argument count or types do not match the address's schema.
    #[error("schema mismatch for {address}: {detail}")]
    SchemaMismatch { address: String, detail: String },

    /// The message could not be serialized.
    #[error("encoding OSC message: {0:?}")]
    Encode(rosc::OscError),
}

/// Serialize a wire message to datagram bytes.
pub fn encode(message: OscMessage) -> Result<Vec<u8>, CodecError> {
    rosc::encoder::encode(&OscPacket::Message(message)).map_err(CodecError::Encode)
}

/// Parse datagram bytes into a wire message.
pub fn decode(bytes: &[u8]) -> Result<OscMessage, CodecError> {
    let (_, packet) = rosc::decoder::decode_udp(bytes).map_err(CodecError::Malformed)?;
    match packet {
        OscPacket::Message(message) => Ok(message),
        OscPacket::Bundle(_) => Err(CodecError::UnsupportedBundle),
    }
}

/// Encode an outbound command, tagging it with the session token.
pub fn encode_outgoing(token: &str, command: Outgoing) -> Result<Vec<u8>, CodecError> {
    let command = match command {
        Outgoing::RunCode { code } => Outgoing::RunCode {
            code: normalize_code(&code),
        },
        other => other,
    };
    encode(command.into_message(token))
}

/// Decode an inbound datagram into the typed message set.
pub fn decode_incoming(bytes: &[u8]) -> Result<Incoming, CodecError> {
    Incoming::try_from(decode(bytes)?)
}

fn normalize_code(code: &str) -> String {
    code.replace("\r\n", "\n")
}

#[cfg(test)]
mod tests {
    use rosc::OscType;

    use super::*;
    use crate::message::address;

    #[test]
    fn encode_decode_round_trips_address_and_arguments() {
        let bytes = encode_outgoing(
            "2a9b",
            Outgoing::RunCode {
                code: "play 60".into(),
            },
        )
        .unwrap();
        let message = decode(&bytes).unwrap();
        assert_eq!(message.addr, address::RUN_CODE);
        assert_eq!(
            message.args,
            vec![
                OscType::String("2a9b".into()),
                OscType::String("play 60".into()),
            ]
        );
    }

    #[test]
    fn incoming_round_trips_through_bytes() {
        let wire = OscMessage {
            addr: address::LOG_INFO.to_owned(),
            args: vec![OscType::Int(1), OscType::String("live_loop :a".into())],
        };
        let bytes = encode(wire).unwrap();
        let incoming = decode_incoming(&bytes).unwrap();
        assert_eq!(
            incoming,
            Incoming::LogInfo {
                job_id: 1,
                text: "live_loop :a".into()
            }
        );
    }

    #[test]
    fn run_code_line_endings_are_normalized() {
        let bytes = encode_outgoing(
            "t",
            Outgoing::RunCode {
                code: "play 60\r\nsleep 1\r\nplay 62".into(),
            },
        )
        .unwrap();
        let message = decode(&bytes).unwrap();
        assert_eq!(
            message.args[1],
            OscType::String("play 60\nsleep 1\nplay 62".into())
        );
    }

    #[test]
    fn garbage_bytes_are_malformed_not_fatal() {
        let err = decode(b"\x00\x01not osc").unwrap_err();
        assert!(matches!(err, CodecError::Malformed(_)), "{err}");
    }

    #[test]
    fn bundles_are_rejected() {
        let bundle = OscPacket::Bundle(rosc::OscBundle {
            timetag: rosc::OscTime {
                seconds: 0,
                fractional: 1,
            },
            content: vec![],
        });
        let bytes = rosc::encoder::encode(&bundle).unwrap();
        let err = decode(&bytes).unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedBundle), "{err}");
    }

    #[test]
    fn schema_violations_surface_as_decode_errors() {
        let message = OscMessage {
            addr: address::ERROR.to_owned(),
            args: vec![OscType::Int(1), OscType::Int(2)],
        };
        let bytes = encode(message).unwrap();
        let err = decode_incoming(&bytes).unwrap_err();
        assert!(matches!(err, CodecError::SchemaMismatch { .. }), "{err}");
    }
}
