//! The closed set of protocol messages exchanged with the server.

use rosc::{OscMessage, OscType};

use crate::codec::CodecError;

/// Protocol addresses understood by this client.
pub mod address {
    // outbound commands
    pub const RUN_CODE: &str = "/run-code";
    pub const STOP_ALL_JOBS: &str = "/stop-all-jobs";
    pub const START_RECORDING: &str = "/start-recording";
    pub const STOP_RECORDING: &str = "/stop-recording";
    pub const SAVE_RECORDING: &str = "/save-recording";
    pub const DELETE_RECORDING: &str = "/delete-recording";
    pub const MIXER_INVERT_STEREO: &str = "/mixer-invert-stereo";
    pub const MIXER_STANDARD_STEREO: &str = "/mixer-standard-stereo";
    pub const MIXER_MONO_MODE: &str = "/mixer-mono-mode";
    pub const MIXER_STEREO_MODE: &str = "/mixer-stereo-mode";

    // inbound events
    pub const LOG_INFO: &str = "/log/info";
    pub const INCOMING_OSC: &str = "/incoming/osc";
    pub const LOG_MULTI_MESSAGE: &str = "/log/multi_message";
    pub const SYNTAX_ERROR: &str = "/syntax_error";
    pub const ERROR: &str = "/error";
}

/// Commands sent to the server. The session token is not part of the
/// variant data; it is prepended as the first argument when the command is
/// turned into a wire message.
#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    RunCode { code: String },
    StopAllJobs,
    StartRecording,
    StopRecording,
    SaveRecording { path: String },
    DeleteRecording,
    InvertStereo,
    StandardStereo,
    MonoMode,
    StereoMode,
}

impl Outgoing {
    pub fn address(&self) -> &'static str {
        match self {
            Outgoing::RunCode { .. } => address::RUN_CODE,
            Outgoing::StopAllJobs => address::STOP_ALL_JOBS,
            Outgoing::StartRecording => address::START_RECORDING,
            Outgoing::StopRecording => address::STOP_RECORDING,
            Outgoing::SaveRecording { .. } => address::SAVE_RECORDING,
            Outgoing::DeleteRecording => address::DELETE_RECORDING,
            Outgoing::InvertStereo => address::MIXER_INVERT_STEREO,
            Outgoing::StandardStereo => address::MIXER_STANDARD_STEREO,
            Outgoing::MonoMode => address::MIXER_MONO_MODE,
            Outgoing::StereoMode => address::MIXER_STEREO_MODE,
        }
    }

    /// Build the wire message, prepending the session token so the server
    /// can tell concurrent clients apart.
    pub fn into_message(self, token: &str) -> OscMessage {
        let addr = self.address().to_owned();
        let mut args = vec![OscType::String(token.to_owned())];
        match self {
            Outgoing::RunCode { code } => args.push(OscType::String(code)),
            Outgoing::SaveRecording { path } => args.push(OscType::String(path)),
            _ => {}
        }
        OscMessage { addr, args }
    }
}

/// Events received from the server.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    LogInfo {
        job_id: i32,
        text: String,
    },
    Cue {
        key: String,
        value: String,
    },
    MultiMessage(MultiMessage),
    SyntaxError {
        job_id: i32,
        description: String,
        /// Text of the offending source line, as reported by the server.
        context: String,
        line: i32,
    },
    RuntimeError {
        job_id: i32,
        description: String,
        backtrace: String,
        line: i32,
    },
}

/// A single code execution's aggregated output fragments.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiMessage {
    pub job_id: i32,
    pub thread_name: Option<String>,
    pub runtime: String,
    pub parts: Vec<MessagePart>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessagePart {
    pub kind: i32,
    pub text: String,
}

impl Incoming {
    pub fn address(&self) -> &'static str {
        match self {
            Incoming::LogInfo { .. } => address::LOG_INFO,
            Incoming::Cue { .. } => address::INCOMING_OSC,
            Incoming::MultiMessage(_) => address::LOG_MULTI_MESSAGE,
            Incoming::SyntaxError { .. } => address::SYNTAX_ERROR,
            Incoming::RuntimeError { .. } => address::ERROR,
        }
    }
}

impl TryFrom<OscMessage> for Incoming {
    type Error = CodecError;

    fn try_from(message: OscMessage) -> Result<Self, CodecError> {
        let mut args = Args::new(&message.addr, message.args);
        let incoming = match message.addr.as_str() {
            address::LOG_INFO => {
                let job_id = args.int()?;
                let text = args.string()?;
                args.finish()?;
                Incoming::LogInfo { job_id, text }
            }
            address::INCOMING_OSC => {
                // the first two arguments identify the cue's origin and are
                // not rendered
                args.skip()?;
                args.skip()?;
                let key = args.string()?;
                let value = args.display()?;
                args.finish()?;
                Incoming::Cue { key, value }
            }
            address::LOG_MULTI_MESSAGE => {
                let job_id = args.int()?;
                let thread_name = match args.string()? {
                    name if name.is_empty() => None,
                    name => Some(name),
                };
                let runtime = args.display()?;
                let count = args.int()?;
                if count < 0 {
                    return Err(args.mismatch("negative part count"));
                }
                let mut parts = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let kind = args.int()?;
                    let text = args.string()?;
                    parts.push(MessagePart { kind, text });
                }
                args.finish()?;
                Incoming::MultiMessage(MultiMessage {
                    job_id,
                    thread_name,
                    runtime,
                    parts,
                })
            }
            address::SYNTAX_ERROR => {
                let job_id = args.int()?;
                let description = args.string()?;
                let context = args.string()?;
                let line = args.int()?;
                // some server versions append a pre-rendered line label;
                // accept and ignore it
                let _ = args.skip();
                Incoming::SyntaxError {
                    job_id,
                    description,
                    context,
                    line,
                }
            }
            address::ERROR => {
                let job_id = args.int()?;
                let description = args.string()?;
                let backtrace = args.string()?;
                let line = args.int()?;
                args.finish()?;
                Incoming::RuntimeError {
                    job_id,
                    description,
                    backtrace,
                    line,
                }
            }
            _ => return Err(CodecError::UnknownAddress(message.addr)),
        };
        Ok(incoming)
    }
}

/// Cursor over a message's argument list, producing a schema error naming
/// the address and the offending position on any mismatch.
struct Args {
    addr: String,
    inner: std::vec::IntoIter<OscType>,
    index: usize,
}

impl Args {
    fn new(addr: &str, args: Vec<OscType>) -> Self {
        Self {
            addr: addr.to_owned(),
            inner: args.into_iter(),
            index: 0,
        }
    }

    fn mismatch(&self, detail: impl Into<String>) -> CodecError {
        CodecError::SchemaMismatch {
            address: self.addr.clone(),
            detail: detail.into(),
        }
    }

    fn next(&mut self, expected: &str) -> Result<OscType, CodecError> {
        let index = self.index;
        self.index += 1;
        self.inner
            .next()
            .ok_or_else(|| self.mismatch(format!("missing argument {index}: expected {expected}")))
    }

    fn int(&mut self) -> Result<i32, CodecError> {
        let index = self.index;
        match self.next("integer")? {
            OscType::Int(value) => Ok(value),
            other => Err(self.mismatch(format!(
                "argument {index}: expected integer, got {other:?}"
            ))),
        }
    }

    fn string(&mut self) -> Result<String, CodecError> {
        let index = self.index;
        match self.next("string")? {
            OscType::String(value) => Ok(value),
            other => Err(self.mismatch(format!(
                "argument {index}: expected string, got {other:?}"
            ))),
        }
    }

    /// Accept any scalar the server may use for a display-only slot and
    /// render it as text.
    fn display(&mut self) -> Result<String, CodecError> {
        let index = self.index;
        match self.next("scalar")? {
            OscType::String(value) => Ok(value),
            OscType::Int(value) => Ok(value.to_string()),
            OscType::Long(value) => Ok(value.to_string()),
            OscType::Float(value) => Ok(value.to_string()),
            OscType::Double(value) => Ok(value.to_string()),
            other => Err(self.mismatch(format!(
                "argument {index}: expected scalar, got {other:?}"
            ))),
        }
    }

    fn skip(&mut self) -> Result<(), CodecError> {
        self.next("any").map(|_| ())
    }

    fn finish(mut self) -> Result<(), CodecError> {
        if self.inner.next().is_some() {
            return Err(self.mismatch(format!("unexpected argument {}", self.index)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(addr: &str, args: Vec<OscType>) -> OscMessage {
        OscMessage {
            addr: addr.to_owned(),
            args,
        }
    }

    #[test]
    fn log_info_decodes() {
        let incoming = Incoming::try_from(message(
            address::LOG_INFO,
            vec![OscType::Int(3), OscType::String("synth :beep".into())],
        ))
        .unwrap();
        assert_eq!(
            incoming,
            Incoming::LogInfo {
                job_id: 3,
                text: "synth :beep".into()
            }
        );
    }

    #[test]
    fn log_info_wrong_arity_is_schema_mismatch() {
        let err = Incoming::try_from(message(address::LOG_INFO, vec![OscType::Int(3)]))
            .unwrap_err();
        assert!(matches!(err, CodecError::SchemaMismatch { .. }), "{err}");
    }

    #[test]
    fn log_info_extra_argument_is_schema_mismatch() {
        let err = Incoming::try_from(message(
            address::LOG_INFO,
            vec![
                OscType::Int(3),
                OscType::String("x".into()),
                OscType::Int(9),
            ],
        ))
        .unwrap_err();
        assert!(matches!(err, CodecError::SchemaMismatch { .. }), "{err}");
    }

    #[test]
    fn log_info_wrong_type_is_schema_mismatch() {
        let err = Incoming::try_from(message(
            address::LOG_INFO,
            vec![OscType::String("3".into()), OscType::String("x".into())],
        ))
        .unwrap_err();
        assert!(matches!(err, CodecError::SchemaMismatch { .. }), "{err}");
    }

    #[test]
    fn unknown_address_is_reported() {
        let err = Incoming::try_from(message("/version", vec![])).unwrap_err();
        assert!(matches!(err, CodecError::UnknownAddress(addr) if addr == "/version"));
    }

    #[test]
    fn cue_coerces_numeric_value() {
        let incoming = Incoming::try_from(message(
            address::INCOMING_OSC,
            vec![
                OscType::String("2020-01-01".into()),
                OscType::Int(0),
                OscType::String("/cue/beat".into()),
                OscType::Float(1.5),
            ],
        ))
        .unwrap();
        assert_eq!(
            incoming,
            Incoming::Cue {
                key: "/cue/beat".into(),
                value: "1.5".into()
            }
        );
    }

    #[test]
    fn multi_message_collects_parts() {
        let incoming = Incoming::try_from(message(
            address::LOG_MULTI_MESSAGE,
            vec![
                OscType::Int(7),
                OscType::String("".into()),
                OscType::Float(0.5),
                OscType::Int(2),
                OscType::Int(0),
                OscType::String("first".into()),
                OscType::Int(1),
                OscType::String("second".into()),
            ],
        ))
        .unwrap();
        assert_eq!(
            incoming,
            Incoming::MultiMessage(MultiMessage {
                job_id: 7,
                thread_name: None,
                runtime: "0.5".into(),
                parts: vec![
                    MessagePart {
                        kind: 0,
                        text: "first".into()
                    },
                    MessagePart {
                        kind: 1,
                        text: "second".into()
                    },
                ],
            })
        );
    }

    #[test]
    fn multi_message_truncated_parts_is_schema_mismatch() {
        let err = Incoming::try_from(message(
            address::LOG_MULTI_MESSAGE,
            vec![
                OscType::Int(7),
                OscType::String("main".into()),
                OscType::String("0.1".into()),
                OscType::Int(2),
                OscType::Int(0),
                OscType::String("only one part".into()),
            ],
        ))
        .unwrap_err();
        assert!(matches!(err, CodecError::SchemaMismatch { .. }), "{err}");
    }

    #[test]
    fn syntax_error_accepts_optional_trailing_label() {
        let with_label = message(
            address::SYNTAX_ERROR,
            vec![
                OscType::Int(1),
                OscType::String("unexpected token".into()),
                OscType::String("plaY :e4".into()),
                OscType::Int(4),
                OscType::String("[Line 4]".into()),
            ],
        );
        let without_label = message(
            address::SYNTAX_ERROR,
            vec![
                OscType::Int(1),
                OscType::String("unexpected token".into()),
                OscType::String("plaY :e4".into()),
                OscType::Int(4),
            ],
        );
        let expected = Incoming::SyntaxError {
            job_id: 1,
            description: "unexpected token".into(),
            context: "plaY :e4".into(),
            line: 4,
        };
        assert_eq!(Incoming::try_from(with_label).unwrap(), expected);
        assert_eq!(Incoming::try_from(without_label).unwrap(), expected);
    }

    #[test]
    fn outgoing_messages_lead_with_the_token() {
        let message = Outgoing::SaveRecording {
            path: "/tmp/take.wav".into(),
        }
        .into_message("token-1");
        assert_eq!(message.addr, address::SAVE_RECORDING);
        assert_eq!(
            message.args,
            vec![
                OscType::String("token-1".into()),
                OscType::String("/tmp/take.wav".into()),
            ]
        );
    }
}
