//! Background relay of container output into the reporting sink.

use std::sync::Arc;

use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::domain::InstanceHandle;
use crate::ports::{LogChunk, LogSink, LogSource, OrchestrationBackend};

/// Prefix for relayed stdout writes.
pub const STDOUT_PREFIX: &str = "cont-out> ";

/// Prefix for relayed stderr writes.
pub const STDERR_PREFIX: &str = "cont-err> ";

/// Remove every `\n` and `\r`.
pub fn strip_line_endings(text: &str) -> String {
    text.chars().filter(|c| *c != '\n' && *c != '\r').collect()
}

/// Sink line for one container write.
pub fn render(chunk: &LogChunk) -> String {
    let prefix = match chunk.source {
        LogSource::Stdout => STDOUT_PREFIX,
        LogSource::Stderr => STDERR_PREFIX,
    };
    let text = String::from_utf8_lossy(&chunk.bytes);
    format!("{}{}", prefix, strip_line_endings(&text))
}

/// Spawns relays.
pub struct LogRelay;

impl LogRelay {
    /// Forward every write of `instance` to `sink` until the stream ends.
    ///
    /// Runs detached; the returned handle aborts it.
    pub fn spawn(
        backend: &dyn OrchestrationBackend,
        instance: &InstanceHandle,
        sink: Arc<dyn LogSink>,
    ) -> RelayHandle {
        let mut logs = backend.logs(instance);
        let container = instance.short_id().to_string();

        let task = tokio::spawn(async move {
            while let Some(next) = logs.next().await {
                match next {
                    Ok(chunk) => sink.record(&render(&chunk)),
                    Err(e) => {
                        debug!(container = %container, error = %e, "log stream failed");
                        break;
                    }
                }
            }
            debug!(container = %container, "log relay finished");
        });

        RelayHandle { task }
    }
}

/// Handle to a running relay. Dropping it aborts the relay.
#[derive(Debug)]
pub struct RelayHandle {
    task: JoinHandle<()>,
}

impl RelayHandle {
    pub fn abort(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the log stream to end.
    pub async fn join(mut self) {
        let _ = (&mut self.task).await;
    }
}

impl Drop for RelayHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
