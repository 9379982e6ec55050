//! Loom entrypoint.
//!
//! A line-oriented host for the branching-text engine: stdin lines either run
//! `:commands` against the open document or are appended to its buffer.
//! Generation requests run as detached tasks and report back through the
//! event channel.
use anyhow::{Context, Result};
use clap::Parser;
use core_actions::io_ops::{self, OpenFileResult, WriteFileResult};
use core_actions::{
    ActionError, CommandParser, DispatchResult, ParsedCommand, PendingGeneration, dispatch,
    finish_generation, sync_buffer, tree_view,
};
use core_events::{
    EVENT_CHANNEL_CAP, Event, EventSourceRegistry, GenerationDone, LineEventSource,
};
use core_provider::{HttpTransport, Transport};
use core_state::Workspace;
use core_text::{Buffer, HostBuffer};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Once};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, trace, warn};
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug)]
#[command(name = "loom", version, about = "Branching text editing with language model completions")]
struct Args {
    /// Text file to open as the active document.
    pub path: Option<PathBuf>,
    /// Configuration file path (overrides discovery of `loom.toml`).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
    /// Persisted workspace state.
    #[arg(long = "state", default_value = "loom-state.json")]
    pub state: PathBuf,
}

fn configure_logging() -> Option<WorkerGuard> {
    let file_appender = tracing_appender::rolling::never(".", "loom.log");
    let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
    match tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(nb_writer)
        .try_init()
    {
        Ok(_) => Some(guard),
        // Global subscriber already installed; dropping the guard stops the writer.
        Err(_) => None,
    }
}

fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            tracing::error!(target: "runtime.panic", ?info, "panic");
            default_panic(info);
        }));
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

struct LoomRuntime<W: Write> {
    ws: Workspace,
    key: String,
    buffer: Buffer,
    file: Option<PathBuf>,
    tx: Option<mpsc::Sender<Event>>,
    /// Fixed transport; `None` builds an `HttpTransport` per request so the
    /// timeout follows the current settings.
    transport: Option<Arc<dyn Transport>>,
    generations: Vec<JoinHandle<()>>,
    out: W,
}

impl<W: Write> LoomRuntime<W> {
    fn new(
        mut ws: Workspace,
        file: Option<PathBuf>,
        buffer: Buffer,
        tx: mpsc::Sender<Event>,
        out: W,
    ) -> Result<Self> {
        let key = file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| buffer.name.clone());
        let outcome = ws
            .open(&key, &buffer.value())
            .with_context(|| format!("opening document {key}"))?;
        info!(target: "runtime", key = key.as_str(), ?outcome, "document_opened");
        Ok(Self {
            ws,
            key,
            buffer,
            file,
            tx: Some(tx),
            transport: None,
            generations: Vec::new(),
            out,
        })
    }

    fn say(&mut self, msg: impl AsRef<str>) {
        if writeln!(self.out, "{}", msg.as_ref()).is_err() {
            warn!(target: "runtime", "output_write_failed");
        }
    }

    fn show_buffer(&mut self) {
        let text = self.buffer.value();
        self.say(text.trim_end_matches('\n'));
    }

    fn save(&mut self) {
        if let Err(e) = self.ws.save() {
            error!(target: "runtime", error = %e, "state_save_failed");
            self.say(format!("error: saving state failed: {e}"));
        }
    }

    fn handle_event(&mut self, event: Event) -> Flow {
        match event {
            Event::Line(line) if line.trim_start().starts_with(':') => {
                self.handle_command(CommandParser::parse(&line))
            }
            Event::Line(line) => {
                self.buffer.append(&line);
                self.buffer.append("\n");
                if let Err(e) = sync_buffer(&mut self.ws, &self.key, &self.buffer) {
                    self.say(format!("error: {e}"));
                }
                Flow::Continue
            }
            Event::GenerationFinished(done) => {
                if done.document != self.key {
                    warn!(target: "runtime", document = done.document.as_str(), "generation_for_unopened_document");
                    return Flow::Continue;
                }
                let res = finish_generation(&mut self.ws, done, &mut self.buffer);
                self.report(res);
                Flow::Continue
            }
            Event::Shutdown => {
                self.save();
                Flow::Quit
            }
        }
    }

    fn handle_command(&mut self, parsed: ParsedCommand) -> Flow {
        trace!(target: "runtime", ?parsed, "command_line");
        match parsed {
            ParsedCommand::Quit => {
                if let Err(e) = sync_buffer(&mut self.ws, &self.key, &self.buffer) {
                    self.say(format!("error: {e}"));
                }
                self.save();
                return Flow::Quit;
            }
            ParsedCommand::Write => {
                match io_ops::write_file(&self.buffer, self.file.as_deref()) {
                    WriteFileResult::Success => {}
                    WriteFileResult::NoFilename => self.say("no file name"),
                    WriteFileResult::Error => self.say("error: write failed"),
                }
                self.save();
            }
            ParsedCommand::Tree => {
                if let Err(e) = sync_buffer(&mut self.ws, &self.key, &self.buffer) {
                    self.say(format!("error: {e}"));
                }
                let outline = self.ws.document(&self.key).map(tree_view::render);
                if let Some(outline) = outline {
                    self.say(outline.trim_end_matches('\n'));
                }
            }
            ParsedCommand::Loom(cmd) => {
                let res = dispatch(cmd, &mut self.ws, &self.key, &mut self.buffer);
                self.report(res);
            }
            ParsedCommand::Unknown(raw) => self.say(format!("unknown command: {raw}")),
        }
        Flow::Continue
    }

    fn report(&mut self, res: Result<DispatchResult, ActionError>) {
        let res = match res {
            Ok(res) => res,
            Err(e) => {
                warn!(target: "runtime", error = %e, "command_failed");
                self.say(format!("error: {e}"));
                return;
            }
        };
        if let Some(notice) = &res.notice {
            self.say(notice);
        }
        if res.buffer_replaced {
            self.show_buffer();
        }
        if res.dirty {
            self.save();
        }
        if let Some(pending) = res.pending {
            self.spawn_generation(pending);
        }
    }

    fn spawn_generation(&mut self, pending: PendingGeneration) {
        let Some(tx) = self.tx.clone() else {
            warn!(target: "runtime", "generation_after_shutdown");
            return;
        };
        let transport = self.transport.clone();
        let handle = tokio::spawn(async move {
            let PendingGeneration {
                document,
                root,
                path_text,
                settings,
            } = pending;
            let result = match transport {
                Some(t) => core_provider::complete(t.as_ref(), &settings, &path_text).await,
                None => {
                    let timeout = Duration::from_secs(settings.model.request_timeout_secs);
                    match HttpTransport::new(timeout) {
                        Ok(t) => core_provider::complete(&t, &settings, &path_text).await,
                        Err(e) => Err(e),
                    }
                }
            };
            let done = GenerationDone {
                document,
                root,
                result,
            };
            if tx.send(Event::GenerationFinished(done)).await.is_err() {
                warn!(target: "runtime.events", "generation_result_dropped");
            }
        });
        self.generations.push(handle);
    }

    async fn finalize_shutdown(&mut self, mut source_handles: Vec<JoinHandle<()>>) {
        info!(target: "runtime", "shutdown_begin");
        drop(self.tx.take());
        for handle in self.generations.drain(..) {
            if !handle.is_finished() {
                trace!(target: "runtime", "generation_abandoned");
                handle.abort();
            }
        }
        while let Some(handle) = source_handles.pop() {
            match tokio::time::timeout(Duration::from_millis(200), handle).await {
                Ok(Ok(_)) => trace!(target: "runtime", "event_source_task_stopped"),
                Ok(Err(err)) if err.is_cancelled() => {
                    trace!(target: "runtime", "event_source_task_cancelled")
                }
                Ok(Err(err)) => error!(target: "runtime", ?err, "event_source_task_error"),
                Err(_) => warn!(target: "runtime", "event_source_task_timeout"),
            }
        }
        if let Err(e) = self.out.flush() {
            warn!(target: "runtime", error = %e, "output_flush_failed");
        }
        info!(target: "runtime", "shutdown_complete");
    }
}

fn load_buffer(path: Option<&PathBuf>) -> Buffer {
    match path {
        Some(p) => match io_ops::open_file(p) {
            OpenFileResult::Success(s) => s.buffer,
            // A missing file starts empty and is created on `:w`.
            OpenFileResult::Error => Buffer::from_str(
                p.file_name().and_then(|s| s.to_str()).unwrap_or("untitled"),
                "",
            ),
        },
        None => Buffer::from_str("untitled", ""),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = configure_logging();
    install_panic_hook();

    let config = core_config::load_from(args.config.clone())?;
    match &config.path {
        Some(path) => info!(target: "runtime", config = %path.display(), "config_in_use"),
        None => info!(target: "runtime", "config_defaults_in_use"),
    }
    let ws = Workspace::load(&args.state, config.settings)
        .with_context(|| format!("loading state from {}", args.state.display()))?;
    let buffer = load_buffer(args.path.as_ref());

    let (tx, mut rx) = mpsc::channel::<Event>(EVENT_CHANNEL_CAP);
    let mut registry = EventSourceRegistry::new();
    registry.register(LineEventSource::stdin());
    let source_handles = registry.spawn_all(&tx);

    let mut runtime = LoomRuntime::new(ws, args.path, buffer, tx, std::io::stdout())?;
    runtime.show_buffer();
    while let Some(event) = rx.recv().await {
        if runtime.handle_event(event) == Flow::Quit {
            break;
        }
    }
    runtime.finalize_shutdown(source_handles).await;
    Ok(())
}
