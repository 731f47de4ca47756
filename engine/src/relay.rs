//! Runtime messages across processes.
//!
//! The bus only reaches listeners in the same process. `watch` and `scan`
//! append what they publish to a JSON-lines log beside the state file, and a
//! popup in another terminal tails that log:
//!
//! ```text
//! MessageBus -> MessageLog::relay -> messages.jsonl -> MessageTail -> PopupFeed
//! ```
//!
//! Each line is one [`RuntimeMessage`] in its wire form. `NEW_EMAIL` requests
//! stay in-process; only the broadcasts a popup reacts to are written.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use becwatch_types::{PersistedState, RuntimeMessage};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast;

use crate::storage::{FileStateStore, StateStore, StorageError};

/// A log larger than this is emptied when the next writer opens it.
pub const MESSAGE_LOG_MAX_BYTES: u64 = 256 * 1024;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("failed to open message log {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write message log {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read message log {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode runtime message: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Append side of the relay.
#[derive(Debug)]
pub struct MessageLog {
    path: PathBuf,
    file: tokio::fs::File,
}

impl MessageLog {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, RelayError> {
        let path = path.into();
        let open_err = |source| RelayError::Open {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(open_err)?;
        }
        let oversized = tokio::fs::metadata(&path)
            .await
            .is_ok_and(|meta| meta.len() > MESSAGE_LOG_MAX_BYTES);

        let mut options = tokio::fs::OpenOptions::new();
        options.create(true);
        if oversized {
            tracing::debug!(path = %path.display(), "Message log over size limit; starting fresh");
            options.write(true).truncate(true);
        } else {
            options.append(true);
        }
        #[cfg(unix)]
        options.mode(0o600);

        let file = options.open(&path).await.map_err(open_err)?;
        Ok(Self { path, file })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&mut self, message: &RuntimeMessage) -> Result<(), RelayError> {
        let mut line = serde_json::to_vec(message).map_err(RelayError::Encode)?;
        line.push(b'\n');
        let write_err = |source| RelayError::Write {
            path: self.path.clone(),
            source,
        };
        self.file.write_all(&line).await.map_err(write_err)?;
        self.file.flush().await.map_err(write_err)
    }

    /// Copy bus broadcasts into the log until every publisher is gone.
    pub async fn relay(mut self, mut messages: broadcast::Receiver<RuntimeMessage>) {
        loop {
            match messages.recv().await {
                Ok(RuntimeMessage::NewEmail(_)) => {}
                Ok(message) => {
                    if let Err(e) = self.append(&message).await {
                        tracing::warn!("Dropping relayed {}: {e}", message.kind());
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Message relay fell behind the bus");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        tracing::debug!(path = %self.path.display(), "Message relay finished");
    }
}

/// Read side of the relay: yields lines appended since the last poll.
#[derive(Debug)]
pub struct MessageTail {
    path: PathBuf,
    offset: u64,
    partial: Vec<u8>,
}

impl MessageTail {
    /// Start at the current end so only messages written from now on count.
    #[must_use]
    pub fn from_end(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let offset = std::fs::metadata(&path).map_or(0, |meta| meta.len());
        Self {
            path,
            offset,
            partial: Vec::new(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Complete lines written since the last call. A missing log yields nothing.
    pub fn poll(&mut self) -> Result<Vec<RuntimeMessage>, RelayError> {
        let read_err = |source| RelayError::Read {
            path: self.path.clone(),
            source,
        };
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(read_err(e)),
        };
        let len = file.metadata().map_err(read_err)?.len();
        if len < self.offset {
            tracing::debug!(path = %self.path.display(), "Message log was truncated");
            self.offset = 0;
            self.partial.clear();
        }
        if len == self.offset {
            return Ok(Vec::new());
        }

        file.seek(SeekFrom::Start(self.offset)).map_err(read_err)?;
        let read = file
            .take(len - self.offset)
            .read_to_end(&mut self.partial)
            .map_err(read_err)?;
        self.offset += read as u64;

        Ok(self.drain_lines())
    }

    fn drain_lines(&mut self) -> Vec<RuntimeMessage> {
        let mut messages = Vec::new();
        while let Some(end) = self.partial.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.partial.drain(..=end).collect();
            let line = line[..end].trim_ascii();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_slice(line) {
                Ok(message) => messages.push(message),
                Err(e) => tracing::warn!("Skipping malformed message log line: {e}"),
            }
        }
        messages
    }
}

/// A change the popup should show.
#[derive(Debug)]
pub enum PopupUpdate {
    /// The state file changed on disk.
    Reloaded(Result<Option<PersistedState>, StorageError>),
    /// A live message from a running `watch` or `scan`.
    Message(RuntimeMessage),
}

/// Everything a popup watches: the state file and, when present, the message log.
#[derive(Debug)]
pub struct PopupFeed {
    store: FileStateStore,
    tail: Option<MessageTail>,
    seen: Option<SystemTime>,
}

impl PopupFeed {
    #[must_use]
    pub fn new(store: FileStateStore, tail: Option<MessageTail>) -> Self {
        Self {
            store,
            tail,
            seen: None,
        }
    }

    /// Read the state now; later polls only report changes after this.
    pub fn load(&mut self) -> Result<Option<PersistedState>, StorageError> {
        self.seen = self.store.modified();
        self.store.load()
    }

    /// State reloads come first so a message about a newer email is applied on top.
    pub fn poll(&mut self) -> Vec<PopupUpdate> {
        let mut updates = Vec::new();

        let modified = self.store.modified();
        if modified != self.seen {
            tracing::debug!("State file changed; reloading popup");
            self.seen = modified;
            updates.push(PopupUpdate::Reloaded(self.store.load()));
        }

        if let Some(tail) = self.tail.as_mut() {
            match tail.poll() {
                Ok(messages) => updates.extend(messages.into_iter().map(PopupUpdate::Message)),
                Err(e) => tracing::warn!("{e}"),
            }
        }
        updates
    }
}
