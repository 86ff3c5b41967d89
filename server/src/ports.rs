//! One-time port discovery.
//!
//! The install ships a discovery helper that negotiates the session's UDP
//! ports and prints them as `name:port` lines. Discovery runs exactly once
//! per session, before the control socket is bound or the server launched.

use std::collections::HashMap;
use std::path::Path;
use std::process::Command;

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("running port discovery: {0}")]
    Spawn(#[from] std::io::Error),

    /// A required service did not appear in the discovery output. Starting
    /// the server without it would mean guessing a port, so this is fatal.
    #[error("no port discovered for required service {0}")]
    MissingPort(&'static str),
}

/// The discovered port for every service taking part in a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortTable {
    pub gui_send_to_server: u16,
    pub gui_listen_to_server: u16,
    pub server_listen_to_gui: u16,
    pub server_osc_cues: u16,
    pub server_send_to_gui: u16,
    pub scsynth: u16,
    pub scsynth_send: u16,
    pub erlang_router: u16,
    pub osc_midi_out: u16,
    pub osc_midi_in: u16,
    pub websocket: u16,
}

impl PortTable {
    pub fn from_output(output: &str) -> Result<Self, DiscoveryError> {
        let map = parse_port_lines(output);
        let take = |name: &'static str| {
            map.get(name)
                .copied()
                .ok_or(DiscoveryError::MissingPort(name))
        };
        Ok(Self {
            gui_send_to_server: take("gui-send-to-server")?,
            gui_listen_to_server: take("gui-listen-to-server")?,
            server_listen_to_gui: take("server-listen-to-gui")?,
            server_osc_cues: take("server-osc-cues")?,
            server_send_to_gui: take("server-send-to-gui")?,
            scsynth: take("scsynth")?,
            scsynth_send: take("scsynth-send")?,
            erlang_router: take("erlang-router")?,
            osc_midi_out: take("osc-midi-out")?,
            osc_midi_in: take("osc-midi-in")?,
            websocket: take("websocket")?,
        })
    }
}

/// Run the discovery helper to completion and parse its combined output.
pub fn discover(interpreter: &Path, script: &Path) -> Result<PortTable, DiscoveryError> {
    tracing::debug!(script = %script.display(), "discovering port numbers");
    let output = Command::new(interpreter).arg(script).output()?;
    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push('\n');
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    PortTable::from_output(&combined)
}

/// Clear out stale state left behind by a previous session. Best-effort:
/// a failure here must not block the session from starting.
pub fn run_init_script(interpreter: &Path, script: &Path) {
    tracing::debug!(script = %script.display(), "cleaning up previous sessions");
    match Command::new(interpreter).arg(script).status() {
        Ok(status) if !status.success() => {
            tracing::warn!(%status, "init script reported failure")
        }
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "could not run init script"),
    }
}

fn parse_port_lines(output: &str) -> HashMap<&str, u16> {
    let mut map = HashMap::new();
    for line in output.lines() {
        let Some((name, port)) = line.split_once(':') else {
            continue;
        };
        match port.trim().parse::<u16>() {
            Ok(port) => {
                map.insert(name.trim(), port);
            }
            Err(_) => tracing::trace!(%line, "skipping malformed discovery line"),
        }
    }
    map
}
