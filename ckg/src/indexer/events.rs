use serde::{Deserialize, Serialize};

/// What happened to a file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

/// One file-change notification, as produced by a watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChangeEvent {
    pub project_id: String,
    pub path: String,
    pub kind: ChangeKind,
}

impl FileChangeEvent {
    pub fn new(project_id: &str, path: &str, kind: ChangeKind) -> Self {
        Self {
            project_id: project_id.to_string(),
            path: path.to_string(),
            kind,
        }
    }
}

/// Progress notifications emitted while indexing. Consumers subscribe via
/// a broadcast channel; lagging subscribers miss events rather than
/// blocking the indexer.
#[derive(Debug, Clone)]
pub enum IndexProgressEvent {
    Started {
        project_id: String,
        total_files: usize,
    },
    FileIndexed {
        project_id: String,
        path: String,
        processed: usize,
        total_files: usize,
    },
    FileFailed {
        project_id: String,
        path: String,
        error: String,
    },
    FileUpdated {
        project_id: String,
        path: String,
        kind: ChangeKind,
    },
    Completed {
        project_id: String,
        nodes: usize,
        edges: usize,
    },
    Stopped {
        project_id: String,
    },
}
