use std::path::PathBuf;
use std::sync::Mutex;
use std::thread::JoinHandle;

use bridge::{Bridge, Event};
use clap::Parser;
use color_eyre::eyre::{self, Context};
use config::{AutoLaunch, Settings};
use crossbeam_channel::Receiver;
use tracing_subscriber::filter::EnvFilter;

struct App {
    bridge: Bridge,
    bridge_events: Receiver<Event>,
    input_rx: Receiver<String>,

    #[allow(dead_code)]
    input_thread: JoinHandle<String>,
}

impl App {
    fn new(bridge: Bridge) -> Self {
        let bridge_events = bridge.events();

        // handle input
        let (input_tx, input_rx) = crossbeam_channel::unbounded();
        let input_thread = std::thread::spawn(move || {
            let mut buffer = String::new();
            loop {
                let n = std::io::stdin()
                    .read_line(&mut buffer)
                    .expect("reading from stdin");
                if n != 0 {
                    let input = buffer.trim().to_owned();
                    let _ = input_tx.send(input);
                    buffer.clear();
                }
            }
        });

        Self {
            bridge,
            bridge_events,
            input_rx,
            input_thread,
        }
    }

    fn loop_step(&mut self) -> eyre::Result<ShouldQuit> {
        crossbeam_channel::select! {
            recv(self.input_rx) -> input =>
                self.handle_input(&input.expect("recv error")).context("handling command"),
            recv(self.bridge_events) -> event => if let Ok(event) = event {
                self.handle_bridge_event(event).context("handling bridge event")
            } else {
                Ok(ShouldQuit::False)
            },
        }
    }

    fn handle_bridge_event(&mut self, event: Event) -> eyre::Result<ShouldQuit> {
        match event {
            Event::Starting => println!("starting the server..."),
            Event::Started => println!("server ready"),
            Event::ServerExited => println!("server exited; restart with a fresh session"),
            Event::Log(line) => println!("{line}"),
            Event::ClearLog => {}
            Event::Cue(line) => println!("cue> {line}"),
            Event::ClearError => {}
            Event::SyntaxError {
                description,
                context,
                line,
                ..
            } => println!("syntax error on line {line}: {description} ({context})"),
            Event::RuntimeError {
                description, line, ..
            } => println!("error on line {line}: {description}"),
        }
        Ok(ShouldQuit::False)
    }

    fn handle_input(&mut self, input: &str) -> eyre::Result<ShouldQuit> {
        match input {
            "q" => return Ok(ShouldQuit::True),
            "start" => self.bridge.start().context("starting session")?,
            "stop" => self.bridge.stop_all_jobs(),
            "rec" => {
                if self.bridge.toggle_recording() {
                    println!("recording... (`save <path>` or `discard` after `rec` again)");
                } else {
                    println!("recording stopped");
                }
            }
            "discard" => self.bridge.delete_recording(),
            "" => return Ok(ShouldQuit::False),
            other => {
                if let Some(path) = other.strip_prefix("run ") {
                    tracing::debug!(%path, "running file");
                    let code = std::fs::read_to_string(path.trim())
                        .with_context(|| format!("reading {path}"))?;
                    self.bridge.run_code(code, 0);
                } else if let Some(path) = other.strip_prefix("save ") {
                    self.bridge.save_recording(PathBuf::from(path.trim()).as_path());
                } else {
                    println!("unhandled command: '{other}'");
                }
            }
        }
        Ok(ShouldQuit::False)
    }
}

#[derive(Debug, Parser)]
struct Args {
    /// Settings file to use instead of the default location
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Override the configured install root
    #[clap(short, long)]
    root: Option<PathBuf>,
}

fn main() -> eyre::Result<()> {
    color_eyre::install().context("installing color_eyre")?;
    let log_file = std::fs::File::create("log.log")?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(Mutex::new(log_file))
        .init();

    let args = Args::parse();
    let mut settings = match &args.config {
        Some(path) => Settings::load_from(path).context("loading settings")?,
        None => Settings::load_default().context("loading settings")?,
    };
    if let Some(root) = args.root {
        settings.root_dir = Some(root);
    }
    tracing::debug!(?settings, "settings loaded");
    let auto_launch = settings.auto_launch;

    let sonic = Bridge::new(settings);
    if auto_launch == AutoLaunch::OnStart {
        sonic.start().context("starting session")?;
    } else {
        println!("type `start` to launch the server");
    }

    let mut app = App::new(sonic);
    println!("commands: start | run <file> | stop | rec | save <path> | discard | q");
    loop {
        match app.loop_step() {
            Ok(ShouldQuit::True) => break,
            Ok(ShouldQuit::False) => {}
            Err(e) => eyre::bail!("Error running command: {e}"),
        }
    }

    Ok(())
}

enum ShouldQuit {
    True,
    False,
}
