use config::Settings;
use server::{PortTable, ServerProcess, SupervisorEvent};
use transport::{DispatcherHandle, Incoming, Outgoing};
use uuid::Uuid;

use crate::render;
use crate::state::{Event, SessionState};

/// Directive prepended to run-code text when safe mode is enabled. Best
/// effort: the server does not acknowledge it.
const SAFE_MODE_DIRECTIVE: &str = "use_arg_checks true #__nosave__ set by user preferences";

/// All mutable session state lives here, behind the bridge's single mutex.
/// The dispatcher thread, the supervisor event pump and UI-triggered calls
/// all mutate the session exclusively through this struct.
pub(crate) struct BridgeInternals {
    pub(crate) state: SessionState,
    token: String,
    run_offset: i32,
    recording: bool,
    pub(crate) settings: Settings,
    events: crossbeam_channel::Sender<Event>,

    sender: Option<transport::Sender>,
    pub(crate) ports: Option<PortTable>,
    pub(crate) process: Option<ServerProcess>,
    pub(crate) dispatcher: Option<DispatcherHandle>,
}

impl BridgeInternals {
    pub(crate) fn new(settings: Settings, events: crossbeam_channel::Sender<Event>) -> Self {
        Self {
            state: SessionState::NotStarted,
            token: Uuid::new_v4().to_string(),
            run_offset: 0,
            recording: false,
            settings,
            events,
            sender: None,
            ports: None,
            process: None,
            dispatcher: None,
        }
    }

    pub(crate) fn token(&self) -> &str {
        &self.token
    }

    pub(crate) fn run_offset(&self) -> i32 {
        self.run_offset
    }

    pub(crate) fn is_recording(&self) -> bool {
        self.recording
    }

    pub(crate) fn emit(&self, event: Event) {
        let _ = self.events.send(event);
    }

    pub(crate) fn log(&self, line: impl Into<String>) {
        self.emit(Event::Log(line.into()));
    }

    pub(crate) fn install_session(
        &mut self,
        ports: PortTable,
        sender: transport::Sender,
        dispatcher: DispatcherHandle,
        process: ServerProcess,
    ) {
        self.ports = Some(ports);
        self.sender = Some(sender);
        self.dispatcher = Some(dispatcher);
        self.process = Some(process);
    }

    /// Send a command, reporting (but not retrying) failures.
    fn send(&self, command: Outgoing) {
        let Some(sender) = &self.sender else {
            tracing::debug!(address = command.address(), "no session, dropping command");
            return;
        };
        if let Err(e) = sender.send(command) {
            tracing::warn!(error = %e, "sending command");
            self.log(format!("[GUI] - could not reach the server: {e}"));
        }
    }

    pub(crate) fn run_code(&mut self, code: String, line_offset: i32) {
        // remembered until the next run, to map error lines reported
        // relative to a selection back onto the buffer
        self.run_offset = line_offset;

        if self.settings.clear_log_on_run {
            self.emit(Event::ClearLog);
        }
        self.emit(Event::ClearError);

        let code = if self.settings.safe_mode {
            format!("{SAFE_MODE_DIRECTIVE}\n{code}")
        } else {
            code
        };
        self.send(Outgoing::RunCode { code });
    }

    pub(crate) fn stop_all_jobs(&self) {
        self.send(Outgoing::StopAllJobs);
    }

    pub(crate) fn start_recording(&mut self) {
        self.recording = true;
        self.send(Outgoing::StartRecording);
    }

    pub(crate) fn stop_recording(&mut self) {
        self.recording = false;
        self.send(Outgoing::StopRecording);
    }

    pub(crate) fn save_recording(&self, path: &std::path::Path) {
        self.send(Outgoing::SaveRecording {
            path: path.to_string_lossy().into_owned(),
        });
    }

    pub(crate) fn delete_recording(&self) {
        self.send(Outgoing::DeleteRecording);
    }

    pub(crate) fn set_invert_stereo(&mut self, enabled: bool) {
        self.settings.invert_stereo = enabled;
        self.push_invert_stereo();
    }

    pub(crate) fn set_force_mono(&mut self, enabled: bool) {
        self.settings.force_mono = enabled;
        self.push_force_mono();
    }

    /// Replace the settings snapshot, mirroring any mixer flag changes to
    /// the server.
    pub(crate) fn update_settings(&mut self, settings: Settings) {
        let invert_changed = settings.invert_stereo != self.settings.invert_stereo;
        let mono_changed = settings.force_mono != self.settings.force_mono;
        self.settings = settings;
        if invert_changed {
            self.push_invert_stereo();
        }
        if mono_changed {
            self.push_force_mono();
        }
    }

    fn push_invert_stereo(&self) {
        self.send(if self.settings.invert_stereo {
            Outgoing::InvertStereo
        } else {
            Outgoing::StandardStereo
        });
    }

    fn push_force_mono(&self) {
        self.send(if self.settings.force_mono {
            Outgoing::MonoMode
        } else {
            Outgoing::StereoMode
        });
    }

    pub(crate) fn on_supervisor_event(&mut self, event: SupervisorEvent) {
        match event {
            SupervisorEvent::Stdout(line) | SupervisorEvent::Stderr(line) => self.log(line),
            SupervisorEvent::Ready => self.on_ready(),
            SupervisorEvent::Exited => {
                tracing::info!("server process exited");
                self.emit(Event::ServerExited);
            }
        }
    }

    /// The server reported readiness: enter `Started` and bring its audio
    /// state in line with the configured mixer flags, which may predate
    /// this (re)start.
    fn on_ready(&mut self) {
        if self.state != SessionState::Starting {
            return;
        }
        self.state = SessionState::Started;
        tracing::info!("server ready");
        self.push_invert_stereo();
        self.push_force_mono();
        self.emit(Event::Started);
    }

    pub(crate) fn handle_incoming(&mut self, message: Incoming) {
        match message {
            Incoming::LogInfo { text, .. } => self.log(text),
            Incoming::Cue { key, value } => {
                self.emit(Event::Cue(render::render_cue(&key, &value)))
            }
            Incoming::MultiMessage(message) => {
                for line in render::render_multi_message(&message) {
                    self.log(line);
                }
            }
            Incoming::SyntaxError {
                job_id,
                description,
                context,
                line,
            } => self.emit(Event::SyntaxError {
                job_id,
                description,
                context,
                line: line + self.run_offset,
            }),
            Incoming::RuntimeError {
                job_id,
                description,
                backtrace,
                line,
            } => self.emit(Event::RuntimeError {
                job_id,
                description,
                backtrace,
                line: line + self.run_offset,
            }),
        }
    }
}
