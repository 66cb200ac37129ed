use std::fmt::Write;

use camino::Utf8PathBuf;
use thiserror::Error;

/// Every way an orchestrator operation can fail.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Task '{0}' is not registered")]
    UnknownTask(String),

    #[error("Task '{0}' is already registered")]
    DuplicateTask(String),

    /// The transform behind a task returned an error.
    #[error("Task '{task}' failed:\n{cause:#}")]
    TaskExecution { task: String, cause: anyhow::Error },

    #[error("Filesystem error at '{path}': {source}")]
    Filesystem {
        path: Utf8PathBuf,
        source: std::io::Error,
    },

    #[error("Couldn't compile glob pattern.\n{0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Couldn't run glob.\n{0}")]
    Glob(#[from] glob::GlobError),

    #[error("Couldn't convert path to UTF-8.\n{0}")]
    PathFormat(#[from] camino::FromPathBufError),

    /// Every failure of a parallel batch, in declared order.
    #[error("{} tasks failed:\n{}", .0.len(), format_errors(.0))]
    Parallel(Vec<Error>),

    #[error("Error while loading configuration:\n{0}")]
    Config(#[from] ConfigError),

    #[cfg(feature = "live")]
    #[error("Error while watching for file changes:\n{0}")]
    Watch(#[from] WatchError),

    #[cfg(feature = "server")]
    #[error("Couldn't start a HTTP server on port {port}: {source}")]
    Serve { port: u16, source: std::io::Error },
}

impl Error {
    pub(crate) fn fs(path: impl Into<Utf8PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Error::Filesystem { path, source }
    }

    /// Names of the tasks whose transforms failed, flattening parallel
    /// batches.
    pub fn failed_tasks(&self) -> Vec<&str> {
        match self {
            Error::TaskExecution { task, .. } => vec![task.as_str()],
            Error::Parallel(errors) => errors.iter().flat_map(Error::failed_tasks).collect(),
            _ => vec![],
        }
    }
}

fn format_errors(errors: &[Error]) -> String {
    let mut acc = String::new();
    for (i, error) in errors.iter().enumerate() {
        let _ = writeln!(acc, "[{}] {error}", i + 1);
    }
    acc
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Couldn't read '{path}': {source}")]
    Read {
        path: Utf8PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Parse(#[from] toml::de::Error),
}

#[cfg(feature = "live")]
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("The watch controller is already watching")]
    AlreadyWatching,

    #[error(transparent)]
    Notify(#[from] notify::Error),

    #[error("Couldn't bind the live-reload socket: {0}")]
    Bind(std::io::Error),
}
