//! Raw events delivered by an event source.

use std::path::PathBuf;

/// A raw, unfiltered notification that something happened under a watched
/// directory.
///
/// The watch loop never looks inside an event to decide what to do; kind and
/// paths only feed diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    /// The kind of event.
    pub kind: RawEventKind,

    /// Paths the event refers to. May be empty.
    pub paths: Vec<PathBuf>,
}

impl RawEvent {
    /// Create a new raw event for a single path.
    pub fn new(kind: RawEventKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            paths: vec![path.into()],
        }
    }
}

impl From<notify::Event> for RawEvent {
    fn from(event: notify::Event) -> Self {
        Self {
            kind: RawEventKind::from(event.kind),
            paths: event.paths,
        }
    }
}

/// Kind of raw event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEventKind {
    /// Entry was created.
    Created,

    /// Entry was modified.
    Modified,

    /// Entry was deleted.
    Deleted,

    /// Entry was renamed (old path).
    RenamedFrom,

    /// Entry was renamed (new path).
    RenamedTo,

    /// Entry metadata changed.
    MetadataChanged,

    /// Entry was opened, read or closed without being written.
    Accessed,

    /// Unknown event type.
    Unknown,
}

impl RawEventKind {
    /// Whether this kind means the tree may have changed.
    pub fn is_change(self) -> bool {
        !matches!(self, Self::Accessed)
    }
}

impl From<notify::EventKind> for RawEventKind {
    fn from(kind: notify::EventKind) -> Self {
        match kind {
            notify::EventKind::Create(_) => Self::Created,
            notify::EventKind::Modify(modify_kind) => match modify_kind {
                notify::event::ModifyKind::Name(rename) => match rename {
                    notify::event::RenameMode::From => Self::RenamedFrom,
                    notify::event::RenameMode::To => Self::RenamedTo,
                    _ => Self::Modified,
                },
                notify::event::ModifyKind::Metadata(_) => Self::MetadataChanged,
                _ => Self::Modified,
            },
            notify::EventKind::Remove(_) => Self::Deleted,
            notify::EventKind::Access(_) => Self::Accessed,
            _ => Self::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, MetadataKind, ModifyKind, RenameMode};
    use pretty_assertions::assert_eq;
    use std::path::Path;

    #[test]
    fn test_kind_from_notify() {
        assert_eq!(
            RawEventKind::from(notify::EventKind::Create(CreateKind::Folder)),
            RawEventKind::Created
        );
        assert_eq!(
            RawEventKind::from(notify::EventKind::Modify(ModifyKind::Name(RenameMode::To))),
            RawEventKind::RenamedTo
        );
        assert_eq!(
            RawEventKind::from(notify::EventKind::Modify(ModifyKind::Metadata(
                MetadataKind::Permissions
            ))),
            RawEventKind::MetadataChanged
        );
        assert_eq!(
            RawEventKind::from(notify::EventKind::Other),
            RawEventKind::Unknown
        );
    }

    #[test]
    fn test_access_is_not_a_change() {
        let kind = RawEventKind::from(notify::EventKind::Access(AccessKind::Read));
        assert!(!kind.is_change());
        assert!(RawEventKind::Unknown.is_change());
        assert!(RawEventKind::Deleted.is_change());
    }

    #[test]
    fn test_raw_event_from_notify_keeps_paths() {
        let event = notify::Event::new(notify::EventKind::Create(CreateKind::File))
            .add_path("/test/a.txt".into());
        let raw = RawEvent::from(event);

        assert_eq!(raw.kind, RawEventKind::Created);
        assert_eq!(raw.paths, vec![Path::new("/test/a.txt").to_path_buf()]);
    }
}
