/// Logging context handed to components at construction.
///
/// Nothing installs a global subscriber. `main` enters the context on the UI
/// thread and workers carry it with `WithSubscriber`, so tests can run with a
/// no-op sink or a capturing layer side by side.
use std::collections::VecDeque;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context as _, Result};
use tracing::dispatcher::DefaultGuard;
use tracing::field::{Field, Visit};
use tracing::{Dispatch, Level, Subscriber};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::registry::Registry;
use tracing_subscriber::{EnvFilter, fmt as tfmt};

/// Env var holding an `EnvFilter` directive, e.g. `SCRIBE_LOG=debug`.
pub const LOG_ENV: &str = "SCRIBE_LOG";

/// Lines kept by the `--debug` pane before the oldest are dropped.
pub const DEBUG_LOG_CAP: usize = 1000;

#[derive(Clone)]
pub struct LogContext {
    dispatch: Dispatch,
}

impl LogContext {
    /// JSON lines appended to `file` and/or recent events kept in `panel`.
    /// With neither, this is `noop()`. Keep the guard alive for as long as
    /// events should reach the file; dropping it flushes.
    pub fn build(file: Option<&Path>, panel: Option<DebugLog>) -> Result<(Self, Option<WorkerGuard>)> {
        let (writer, guard) = match file {
            Some(path) => {
                let (writer, guard) = file_writer(path)?;
                (Some(writer), Some(guard))
            }
            None => (None, None),
        };
        if writer.is_none() && panel.is_none() {
            return Ok((Self::noop(), None));
        }
        Ok((Self::assemble(writer, panel), guard))
    }

    fn assemble(writer: Option<NonBlocking>, panel: Option<DebugLog>) -> Self {
        // The pane exists to watch requests go by, so it lowers the default.
        let default_level = if panel.is_some() { "debug" } else { "info" };
        let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));
        let file_layer = writer.map(|w| tfmt::layer().json().with_writer(w));
        let subscriber = Registry::default().with(filter).with(file_layer).with(panel);
        Self::from_dispatch(Dispatch::new(subscriber))
    }

    /// Discards everything.
    pub fn noop() -> Self {
        Self::from_dispatch(Dispatch::none())
    }

    pub fn from_dispatch(dispatch: Dispatch) -> Self {
        Self { dispatch }
    }

    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Make this context the current thread's default until the guard drops.
    pub fn enter(&self) -> DefaultGuard {
        tracing::dispatcher::set_default(&self.dispatch)
    }

    /// Run `f` with this context as the default.
    pub fn scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }
}

fn file_writer(path: &Path) -> Result<(NonBlocking, WorkerGuard)> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating log directory {}", dir.display()))?;
    let file_name = path
        .file_name()
        .context("log path has no file name")?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    Ok(tracing_appender::non_blocking(appender))
}

// ── Debug pane sink ───────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogLine {
    pub time: String,
    pub level: Level,
    pub text: String,
}

/// Bounded, shared tail of recent events. The layer side pushes from any
/// thread; the TUI reads a snapshot each frame.
#[derive(Clone)]
pub struct DebugLog {
    lines: Arc<Mutex<VecDeque<LogLine>>>,
    cap: usize,
}

impl DebugLog {
    pub fn new(cap: usize) -> Self {
        Self {
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(cap.min(DEBUG_LOG_CAP)))),
            cap: cap.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<LogLine>> {
        // A panic mid-push leaves the deque intact; keep using it.
        self.lines.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn push(&self, line: LogLine) {
        let mut lines = self.lock();
        while lines.len() >= self.cap {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// The newest `n` lines, oldest first.
    pub fn tail(&self, n: usize) -> Vec<LogLine> {
        let lines = self.lock();
        let skip = lines.len().saturating_sub(n);
        lines.iter().skip(skip).cloned().collect()
    }
}

#[derive(Default)]
struct FieldCollector {
    fields: Vec<(String, String)>,
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.fields.push((field.name().to_string(), value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.fields
            .push((field.name().to_string(), format!("{value:?}")));
    }
}

impl FieldCollector {
    /// `message k=v k=v`, message first when present.
    fn into_text(self) -> String {
        let mut message = String::new();
        let mut rest = Vec::new();
        for (name, value) in self.fields {
            if name == "message" {
                message = value;
            } else {
                rest.push(format!("{name}={value}"));
            }
        }
        if rest.is_empty() {
            return message;
        }
        if message.is_empty() {
            return rest.join(" ");
        }
        format!("{message} {}", rest.join(" "))
    }
}

impl<S> Layer<S> for DebugLog
where
    S: Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut collector = FieldCollector::default();
        event.record(&mut collector);
        self.push(LogLine {
            time: chrono::Local::now().format("%H:%M:%S").to_string(),
            level: *event.metadata().level(),
            text: collector.into_text(),
        });
    }
}

#[cfg(test)]
pub(crate) mod capture {
    //! Test layer that records events so assertions can inspect them.
    use std::sync::{Arc, Mutex};

    use tracing::Subscriber;
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
    use tracing_subscriber::registry::Registry;

    use super::{FieldCollector, LogContext};

    #[derive(Clone, Debug)]
    pub struct CapturedEvent {
        pub level: tracing::Level,
        pub fields: Vec<(String, String)>,
    }

    impl CapturedEvent {
        pub fn field(&self, name: &str) -> Option<&str> {
            self.fields
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.as_str())
        }
    }

    #[derive(Clone, Default)]
    pub struct Capture {
        pub events: Arc<Mutex<Vec<CapturedEvent>>>,
    }

    impl<S> Layer<S> for Capture
    where
        S: Subscriber,
    {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            let mut collector = FieldCollector::default();
            event.record(&mut collector);
            self.events.lock().unwrap().push(CapturedEvent {
                level: *event.metadata().level(),
                fields: collector.fields,
            });
        }
    }

    /// A context whose events land in the returned vector.
    pub fn capturing() -> (LogContext, Arc<Mutex<Vec<CapturedEvent>>>) {
        let capture = Capture::default();
        let events = capture.events.clone();
        let dispatch = tracing::Dispatch::new(Registry::default().with(capture));
        (LogContext::from_dispatch(dispatch), events)
    }
}
