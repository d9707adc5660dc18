use std::path::PathBuf;
use std::time::Instant;

use notify::event::{AccessKind as OsAccess, AccessMode, EventKind};

/// What the OS reported for a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    OpenedForRead,
}

/// One observed file access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessEvent {
    pub path: PathBuf,
    /// Delivery time (monotonic within one monitor).
    pub at: Instant,
    pub kind: AccessKind,
}

impl AccessEvent {
    pub fn opened(path: impl Into<PathBuf>, at: Instant) -> Self {
        Self {
            path: path.into(),
            at,
            kind: AccessKind::OpenedForRead,
        }
    }
}

/// Map a notify event onto access events.
///
/// inotify reports `IN_OPEN` without telling reads from writes; writes by
/// the compiler go to its output directory and are sorted out downstream.
/// A close after read-only access is mapped too, so a file opened before the
/// watch was attached still shows up once it is closed.
pub(super) fn from_notify(event: &notify::Event, at: Instant) -> Vec<AccessEvent> {
    let is_read_access = matches!(
        event.kind,
        EventKind::Access(
            OsAccess::Open(_) | OsAccess::Read | OsAccess::Close(AccessMode::Read)
        )
    );
    if !is_read_access {
        return Vec::new();
    }
    event
        .paths
        .iter()
        .map(|path| AccessEvent::opened(path.clone(), at))
        .collect()
}
