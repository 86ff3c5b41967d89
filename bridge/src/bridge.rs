use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;

use config::Settings;
use eyre::WrapErr;
use server::{ConfigurationError, InstallPaths};
use transport::{address, Dispatcher};

use crate::internals::BridgeInternals;
use crate::state::{Event, SessionState};

/// One editor session against the Sonic Pi server.
///
/// The bridge is cheap to construct; nothing touches the network or the
/// filesystem until [`Bridge::start`]. Dropping the bridge tears the
/// session down: the receive loop is stopped and the server process
/// terminated.
pub struct Bridge {
    internals: Arc<Mutex<BridgeInternals>>,
    rx: crossbeam_channel::Receiver<Event>,
}

impl Bridge {
    pub fn new(settings: Settings) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            internals: Arc::new(Mutex::new(BridgeInternals::new(settings, tx))),
            rx,
        }
    }

    /// Subscribe to the bridge's event stream.
    pub fn events(&self) -> crossbeam_channel::Receiver<Event> {
        self.rx.clone()
    }

    /// Discover ports, bind the control socket and launch the server.
    ///
    /// Idempotent: calling again while starting or started does nothing.
    /// On failure the bridge is left `NotStarted` so the caller can fix the
    /// configuration and retry.
    #[tracing::instrument(skip(self))]
    pub fn start(&self) -> eyre::Result<()> {
        {
            let mut internals = self.internals.lock().unwrap();
            if internals.state != SessionState::NotStarted {
                tracing::debug!(state = ?internals.state, "session already started");
                return Ok(());
            }
            internals.state = SessionState::Starting;
            internals.emit(Event::Starting);
        }

        match self.start_session() {
            Ok(()) => Ok(()),
            Err(e) => {
                self.internals.lock().unwrap().state = SessionState::NotStarted;
                Err(e)
            }
        }
    }

    fn start_session(&self) -> eyre::Result<()> {
        let (settings, token) = {
            let internals = self.internals.lock().unwrap();
            (internals.settings.clone(), internals.token().to_owned())
        };

        let root = settings
            .root_dir
            .as_deref()
            .ok_or(ConfigurationError::MissingRoot)?;
        let paths = InstallPaths::resolve(root, settings.interpreter.as_deref())?;
        if let Err(e) = paths.ensure_log_dir() {
            tracing::warn!(error = %e, "could not create log directory");
        }

        self.log("[GUI] - Cleaning old sessions...");
        server::run_init_script(&paths.interpreter, &paths.init_script);

        self.log("[GUI] - Discovering port numbers...");
        let ports = server::discover(&paths.interpreter, &paths.port_discovery_script)
            .wrap_err("discovering server ports")?;
        tracing::debug!(?ports, "ports discovered");

        // the control socket must be listening before the server starts
        // talking to it
        let mut dispatcher =
            Dispatcher::bind(ports.gui_listen_to_server).wrap_err("binding control socket")?;
        self.register_handlers(&mut dispatcher);
        let sender = transport::Sender::connect(ports.gui_send_to_server, token)
            .wrap_err("opening command socket")?;
        let dispatcher = dispatcher.spawn();

        self.log("[GUI] - Launching Sonic Pi server...");
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        let process = match server::launch(
            &paths.interpreter,
            &paths.server_script,
            &ports,
            events_tx,
        ) {
            Ok(process) => process,
            Err(e) => {
                // the bound socket must not outlive a failed start
                let mut dispatcher = dispatcher;
                dispatcher.stop();
                return Err(e).wrap_err("launching server process");
            }
        };
        tracing::debug!(pid = process.id(), "server process started");

        let pump = Arc::clone(&self.internals);
        thread::spawn(move || {
            for event in events_rx {
                pump.lock().unwrap().on_supervisor_event(event);
            }
        });

        self.internals
            .lock()
            .unwrap()
            .install_session(ports, sender, dispatcher, process);
        Ok(())
    }

    fn register_handlers(&self, dispatcher: &mut Dispatcher) {
        for addr in [
            address::LOG_INFO,
            address::INCOMING_OSC,
            address::LOG_MULTI_MESSAGE,
            address::SYNTAX_ERROR,
            address::ERROR,
        ] {
            let internals = Arc::clone(&self.internals);
            dispatcher.register(addr, move |message| {
                internals.lock().unwrap().handle_incoming(message);
            });
        }
    }

    fn log(&self, line: &str) {
        self.internals.lock().unwrap().log(line);
    }

    /// Send code to be executed. `line_offset` is the buffer line the text
    /// starts on: 0 for a whole-buffer run, the selection's first line for
    /// a partial run.
    pub fn run_code(&self, code: impl Into<String>, line_offset: i32) {
        self.internals
            .lock()
            .unwrap()
            .run_code(code.into(), line_offset);
    }

    pub fn stop_all_jobs(&self) {
        self.internals.lock().unwrap().stop_all_jobs();
    }

    pub fn start_recording(&self) {
        self.internals.lock().unwrap().start_recording();
    }

    pub fn stop_recording(&self) {
        self.internals.lock().unwrap().stop_recording();
    }

    /// Flip the recording substate, returning `true` when a recording has
    /// just begun. After stopping, the caller decides between
    /// [`Bridge::save_recording`] and [`Bridge::delete_recording`].
    pub fn toggle_recording(&self) -> bool {
        let mut internals = self.internals.lock().unwrap();
        if internals.is_recording() {
            internals.stop_recording();
            false
        } else {
            internals.start_recording();
            true
        }
    }

    pub fn save_recording(&self, path: &Path) {
        self.internals.lock().unwrap().save_recording(path);
    }

    pub fn delete_recording(&self) {
        self.internals.lock().unwrap().delete_recording();
    }

    pub fn set_invert_stereo(&self, enabled: bool) {
        self.internals.lock().unwrap().set_invert_stereo(enabled);
    }

    pub fn set_force_mono(&self, enabled: bool) {
        self.internals.lock().unwrap().set_force_mono(enabled);
    }

    /// Hand the bridge a fresh settings snapshot after the user changed
    /// something. Mixer flag changes are mirrored to the server.
    pub fn update_settings(&self, settings: Settings) {
        self.internals.lock().unwrap().update_settings(settings);
    }

    pub fn is_started(&self) -> bool {
        self.internals.lock().unwrap().state == SessionState::Started
    }

    pub fn is_recording(&self) -> bool {
        self.internals.lock().unwrap().is_recording()
    }

    pub fn session_token(&self) -> String {
        self.internals.lock().unwrap().token().to_owned()
    }

    pub fn run_offset(&self) -> i32 {
        self.internals.lock().unwrap().run_offset()
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        // take the resources out first: joining the receive loop while
        // holding the lock would deadlock against a handler waiting for it
        let dispatcher = self.internals.lock().unwrap().dispatcher.take();
        drop(dispatcher);
        let process = self.internals.lock().unwrap().process.take();
        drop(process);
    }
}
