//! The supervised server child process.

use std::ffi::OsString;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;

use eyre::WrapErr;

use crate::ports::PortTable;

/// Fixed substring of the server's startup output signalling readiness.
pub const READY_BANNER: &str = "Sonic Pi Server successfully booted";

/// Notifications from the child process's output streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorEvent {
    Stdout(String),
    Stderr(String),
    /// Fired exactly once, on the first stdout line containing the banner.
    Ready,
    /// The child's stdout reached end of file; the process has exited or is
    /// exiting. Reported only — there is no automatic restart, the editor
    /// always offers an explicit restart action instead.
    Exited,
}

/// Handle to the running server. Dropping it terminates the child.
pub struct ServerProcess {
    child: Child,
}

impl ServerProcess {
    pub fn id(&self) -> u32 {
        self.child.id()
    }
}

impl Drop for ServerProcess {
    fn drop(&mut self) {
        tracing::debug!("terminating server");
        match self.child.kill() {
            Ok(_) => {
                tracing::debug!("server terminated");
                let _ = self.child.wait();
            }
            Err(e) => tracing::warn!(error = %e, "could not terminate server process"),
        }
    }
}

/// Start the server as a long-running child process, streaming its output
/// lines as [`SupervisorEvent`]s.
pub fn launch(
    interpreter: &Path,
    server_script: &Path,
    ports: &PortTable,
    events: crossbeam_channel::Sender<SupervisorEvent>,
) -> eyre::Result<ServerProcess> {
    tracing::debug!(
        interpreter = %interpreter.display(),
        script = %server_script.display(),
        "starting server process"
    );
    let mut child = Command::new(interpreter)
        .args(server_args(server_script, ports))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .wrap_err("spawning server process")?;

    let stdout = child.stdout.take().expect("stdout was requested piped");
    let stdout_events = events.clone();
    thread::spawn(move || {
        let reader = BufReader::new(stdout);
        let mut should_signal = true;
        for line in reader.lines() {
            let Ok(line) = line else { break };
            if should_signal && line.contains(READY_BANNER) {
                should_signal = false;
                let _ = stdout_events.send(SupervisorEvent::Stdout(line));
                let _ = stdout_events.send(SupervisorEvent::Ready);
                continue;
            }
            let _ = stdout_events.send(SupervisorEvent::Stdout(line));
        }
        let _ = stdout_events.send(SupervisorEvent::Exited);
    });

    let stderr = child.stderr.take().expect("stderr was requested piped");
    thread::spawn(move || {
        let reader = BufReader::new(stderr);
        for line in reader.lines() {
            let Ok(line) = line else { break };
            let _ = events.send(SupervisorEvent::Stderr(line));
        }
    });

    Ok(ServerProcess { child })
}

/// Argument list for the server launch: interpreter flags pinning string
/// encoding, the entry point, the UDP mode flag, then the ports in the
/// order the server expects them.
fn server_args(server_script: &Path, ports: &PortTable) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "--enable-frozen-string-literal".into(),
        "-E".into(),
        "utf-8".into(),
        server_script.into(),
        "-u".into(),
    ];
    for port in [
        ports.server_listen_to_gui,
        ports.server_send_to_gui,
        ports.scsynth,
        ports.scsynth_send,
        ports.server_osc_cues,
        ports.erlang_router,
        ports.osc_midi_out,
        ports.osc_midi_in,
        ports.websocket,
    ] {
        args.push(port.to_string().into());
    }
    args
}

#[cfg(test)]
mod tests {
    use std::io::IsTerminal;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;
    use std::time::Duration;

    use tracing_subscriber::EnvFilter;

    use super::*;

    fn init_test_logger() {
        let in_ci = std::env::var("CI")
            .map(|val| val == "true")
            .unwrap_or(false);

        if std::io::stderr().is_terminal() || in_ci {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::from_default_env())
                .try_init();
        } else {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::from_default_env())
                .json()
                .try_init();
        }
    }

    fn test_ports() -> PortTable {
        PortTable {
            gui_send_to_server: 51235,
            gui_listen_to_server: 51236,
            server_listen_to_gui: 51237,
            server_osc_cues: 4560,
            server_send_to_gui: 51238,
            scsynth: 51239,
            scsynth_send: 51240,
            erlang_router: 51241,
            osc_midi_out: 51242,
            osc_midi_in: 51243,
            websocket: 51244,
        }
    }

    #[test]
    fn launch_arguments_are_in_server_order() {
        let args = server_args(&PathBuf::from("/opt/sp/server.rb"), &test_ports());
        let args: Vec<String> = args
            .into_iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "--enable-frozen-string-literal",
                "-E",
                "utf-8",
                "/opt/sp/server.rb",
                "-u",
                "51237",
                "51238",
                "51239",
                "51240",
                "4560",
                "51241",
                "51242",
                "51243",
                "51244",
            ]
        );
    }

    #[test]
    fn banner_fires_ready_exactly_once() {
        init_test_logger();

        // fake interpreter: prints the banner twice, then lingers so the
        // drop-kill path is exercised too
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("fake-interpreter");
        std::fs::write(
            &fake,
            format!("#!/bin/sh\necho 'booting'\necho '{READY_BANNER}'\necho '{READY_BANNER}'\nsleep 5\n"),
        )
        .unwrap();
        let mut permissions = std::fs::metadata(&fake).unwrap().permissions();
        permissions.set_mode(0o755);
        std::fs::set_permissions(&fake, permissions).unwrap();

        let (tx, rx) = crossbeam_channel::unbounded();
        let process = launch(&fake, &PathBuf::from("server.rb"), &test_ports(), tx).unwrap();

        let mut ready_count = 0;
        let mut stdout_lines = Vec::new();
        // three echoes plus one Ready should arrive well within the window
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while stdout_lines.len() < 3 || ready_count < 1 {
            let remaining = deadline
                .checked_duration_since(std::time::Instant::now())
                .expect("timed out waiting for supervisor events");
            match rx.recv_timeout(remaining).unwrap() {
                SupervisorEvent::Stdout(line) => stdout_lines.push(line),
                SupervisorEvent::Ready => ready_count += 1,
                SupervisorEvent::Stderr(_) | SupervisorEvent::Exited => {}
            }
        }
        // drain anything already queued; the second banner line must not
        // have produced a second Ready
        while let Ok(event) = rx.recv_timeout(Duration::from_millis(200)) {
            if event == SupervisorEvent::Ready {
                ready_count += 1;
            }
        }
        assert_eq!(ready_count, 1);
        assert_eq!(stdout_lines[0], "booting");

        drop(process);
    }

    #[test]
    fn process_exit_is_reported() {
        init_test_logger();

        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("fake-interpreter");
        std::fs::write(&fake, "#!/bin/sh\necho 'one line'\n").unwrap();
        let mut permissions = std::fs::metadata(&fake).unwrap().permissions();
        permissions.set_mode(0o755);
        std::fs::set_permissions(&fake, permissions).unwrap();

        let (tx, rx) = crossbeam_channel::unbounded();
        let _process = launch(&fake, &PathBuf::from("server.rb"), &test_ports(), tx).unwrap();

        let mut events = Vec::new();
        while let Ok(event) = rx.recv_timeout(Duration::from_secs(5)) {
            let done = event == SupervisorEvent::Exited;
            events.push(event);
            if done {
                break;
            }
        }
        assert_eq!(
            events,
            vec![
                SupervisorEvent::Stdout("one line".into()),
                SupervisorEvent::Exited,
            ]
        );
    }
}
