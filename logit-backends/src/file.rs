use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use logit_core::{Backend, BackendFilter, Event, Level, LogitError, LogitResult};

use crate::buffer::WriteBuffer;
use crate::format::{EventFormatter, JsonFormatter, TextFormatter};

/// Configuration for [`FileBackend`].
#[derive(Debug, Clone)]
pub struct FileConfig {
    pub path: PathBuf,
    pub name: String,
    pub level: Level,
    pub follow_symlinks: bool,
    pub file_mode: u32,
    pub buffer_capacity: usize,
    pub json: bool,
}

impl FileConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            name: "file".to_string(),
            level: Level::Info,
            follow_symlinks: false,
            file_mode: 0o600,
            buffer_capacity: 0,
            json: true,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    pub fn with_file_mode(mut self, mode: u32) -> Self {
        self.file_mode = mode;
        self
    }

    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }
}

/// Appends formatted events to a log file.
///
/// The parent directory must already exist. The final path component is
/// rejected when it is a symlink, unless the config opts in to following
/// them. Files created here are restricted to owner-only permissions;
/// pre-existing files keep whatever mode they have.
pub struct FileBackend {
    name: String,
    filter: BackendFilter,
    formatter: Box<dyn EventFormatter>,
    writer: WriteBuffer,
    path: PathBuf,
}

impl FileBackend {
    pub fn new(config: FileConfig) -> LogitResult<Self> {
        let resolved = resolve_path(&config.path, config.follow_symlinks)?;
        let created = !resolved.exists();
        let file = OpenOptions::new().create(true).append(true).open(&resolved)?;
        if created {
            apply_permissions(&resolved, config.file_mode);
        }
        let formatter: Box<dyn EventFormatter> = if config.json {
            Box::new(JsonFormatter::new())
        } else {
            Box::new(TextFormatter::new().with_color(false))
        };
        Ok(Self {
            name: config.name,
            filter: BackendFilter::new(config.level),
            formatter,
            writer: WriteBuffer::new(Box::new(file), config.buffer_capacity),
            path: resolved,
        })
    }

    /// The canonicalized path events are written to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for FileBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileBackend")
            .field("name", &self.name)
            .field("filter", &self.filter)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Backend for FileBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn filter(&self) -> &BackendFilter {
        &self.filter
    }

    fn log(&self, event: &Event) -> LogitResult<()> {
        self.writer.write_line(&self.formatter.format(event))
    }

    async fn flush(&self) -> LogitResult<()> {
        self.writer.flush()
    }

    async fn close(&self) -> LogitResult<()> {
        self.writer.flush()
    }
}

/// Canonicalizes the parent directory and re-attaches the file name, so the
/// symlink check below sees the real final component.
fn resolve_path(path: &Path, follow_symlinks: bool) -> LogitResult<PathBuf> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let parent = parent.canonicalize().map_err(|_| LogitError::InvalidPath {
        path: path.to_path_buf(),
        reason: "parent directory does not exist or is not accessible".to_string(),
    })?;
    let file_name = path.file_name().ok_or_else(|| LogitError::InvalidPath {
        path: path.to_path_buf(),
        reason: "path has no file name".to_string(),
    })?;
    let resolved = parent.join(file_name);

    if !follow_symlinks {
        if let Ok(metadata) = std::fs::symlink_metadata(&resolved) {
            if metadata.file_type().is_symlink() {
                return Err(LogitError::SymlinkedPath(resolved));
            }
        }
    }
    Ok(resolved)
}

#[cfg(unix)]
fn apply_permissions(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(err) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)) {
        tracing::warn!(path = %path.display(), error = %err, "Failed to restrict log file permissions");
    }
}

#[cfg(not(unix))]
fn apply_permissions(_path: &Path, _mode: u32) {}
