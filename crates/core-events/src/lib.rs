//! Event types and async event sources for the Loom runtime.
//!
//! The event loop consumes a single bounded channel. Producers are host input
//! (one line at a time) and finished generation tasks, each of which posts a
//! [`Event::GenerationFinished`] back so that attaching results happens on the
//! loop, never inside the task.

use core_provider::CompletionError;
use core_tree::NodeId;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;

// -------------------------------------------------------------------------------------------------
// Channel Policy
// -------------------------------------------------------------------------------------------------
// Bounded so a runaway producer parks instead of growing memory. Producers use `send().await`;
// a send error means the loop is gone and the producer must stop.
// -------------------------------------------------------------------------------------------------
pub const EVENT_CHANNEL_CAP: usize = 1024;

pub static CHANNEL_SEND_FAILURES: AtomicU64 = AtomicU64::new(0);
pub static LINES_READ: AtomicU64 = AtomicU64::new(0);

/// Top-level event enum consumed by the central event loop.
#[derive(Debug, Clone)]
pub enum Event {
    /// One line of host input, without its terminator.
    Line(String),
    GenerationFinished(GenerationDone),
    Shutdown,
}

/// Outcome of a spawned generation task.
#[derive(Debug, Clone)]
pub struct GenerationDone {
    /// Workspace key of the document the request was made for.
    pub document: String,
    /// Node the completions should be attached under.
    pub root: NodeId,
    pub result: Result<Vec<String>, CompletionError>,
}

/// Trait implemented by any async event producer.
///
/// Each source spawns one background task that pushes `Event`s into the
/// shared channel and stops when `tx.send(..).await` fails.
pub trait AsyncEventSource: Send + 'static {
    /// Stable identifier used in logs.
    fn name(&self) -> &'static str;
    fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()>;
}

/// Registry of event sources, spawned together at startup.
pub struct EventSourceRegistry {
    sources: Vec<Box<dyn AsyncEventSource>>,
}

impl Default for EventSourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSourceRegistry {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    pub fn register<S: AsyncEventSource>(&mut self, src: S) {
        self.sources.push(Box::new(src));
    }

    /// Spawn all registered sources, returning their JoinHandles. Each source
    /// receives its own `Sender` clone; the caller keeps `tx`.
    ///
    /// During shutdown the caller should drop its last `Sender` before awaiting
    /// the handles so sources observe the closed channel.
    pub fn spawn_all(&mut self, tx: &Sender<Event>) -> Vec<JoinHandle<()>> {
        let mut out = Vec::with_capacity(self.sources.len());
        for src in self.sources.drain(..) {
            let name = src.name();
            tracing::info!(target: "runtime.events", source = name, "spawning event source");
            out.push(src.spawn(tx.clone()));
        }
        out
    }
}

/// Reads lines from any async reader and emits [`Event::Line`] for each.
/// End of input emits [`Event::Shutdown`].
pub struct LineEventSource<R> {
    reader: R,
}

impl<R> LineEventSource<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl LineEventSource<BufReader<tokio::io::Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R> AsyncEventSource for LineEventSource<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    fn name(&self) -> &'static str {
        "lines"
    }

    fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()> {
        let mut lines = self.reader.lines();
        tokio::spawn(async move {
            loop {
                let event = match lines.next_line().await {
                    Ok(Some(line)) => {
                        LINES_READ.fetch_add(1, Ordering::Relaxed);
                        Event::Line(line)
                    }
                    Ok(None) => Event::Shutdown,
                    Err(e) => {
                        tracing::error!(target: "runtime.events", error = %e, "line_read_failed");
                        Event::Shutdown
                    }
                };
                let last = matches!(event, Event::Shutdown);
                if tx.send(event).await.is_err() {
                    CHANNEL_SEND_FAILURES.fetch_add(1, Ordering::Relaxed);
                    break;
                }
                if last {
                    break;
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn line_source_emits_lines_then_shutdown() {
        let (tx, mut rx) = mpsc::channel::<Event>(8);
        let mut reg = EventSourceRegistry::new();
        reg.register(LineEventSource::new(&b"hello\n:tree\nlast"[..]));
        let handles = reg.spawn_all(&tx);
        drop(tx);

        let mut lines = Vec::new();
        let mut shut_down = false;
        while let Some(ev) = rx.recv().await {
            match ev {
                Event::Line(l) => lines.push(l),
                Event::Shutdown => shut_down = true,
                Event::GenerationFinished(_) => panic!("unexpected generation event"),
            }
        }
        assert_eq!(lines, vec!["hello", ":tree", "last"]);
        assert!(shut_down);
        for handle in handles {
            handle.await.expect("line source exits cleanly");
        }
    }

    struct MockCloseSource {
        flag: Arc<AtomicBool>,
    }

    impl AsyncEventSource for MockCloseSource {
        fn name(&self) -> &'static str {
            "mock_close"
        }

        fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()> {
            let flag = self.flag;
            tokio::spawn(async move {
                tx.closed().await;
                flag.store(true, Ordering::SeqCst);
            })
        }
    }

    #[tokio::test]
    async fn registry_sources_exit_on_channel_drop() {
        let (tx, rx) = mpsc::channel::<Event>(8);
        let mut reg = EventSourceRegistry::new();
        let flag = Arc::new(AtomicBool::new(false));
        reg.register(MockCloseSource { flag: flag.clone() });
        let handles = reg.spawn_all(&tx);

        drop(tx);
        drop(rx);

        for handle in handles {
            match tokio::time::timeout(Duration::from_millis(50), handle).await {
                Ok(join_res) => join_res.expect("source task should exit cleanly"),
                Err(_) => panic!("source task did not observe channel closure"),
            }
        }

        assert!(flag.load(Ordering::SeqCst));
    }
}
