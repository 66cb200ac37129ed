use std::fmt::Debug;
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use glob::{MatchOptions, Pattern};
use indicatif::ProgressStyle;
use tracing::Level;
use tracing_indicatif::span_ext::IndicatifSpanExt;

use crate::{Environment, Error, Orchestrator, Reload};

static TASK_STYLE: LazyLock<ProgressStyle> = LazyLock::new(|| {
    ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed}] {msg}")
        .expect("Error setting progress bar template")
});

pub(crate) const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Result from a single task transform: the number of files processed.
pub type TaskResult = anyhow::Result<usize>;

type TaskFnPtr = Arc<dyn Fn(&TaskContext) -> TaskResult + Send + Sync>;

/// A named, side-effecting build step.
///
/// Inputs are glob patterns relative to the orchestrator's source root, a
/// pattern starting with `!` excludes whatever it matches. The output
/// directory is relative to the orchestrator's output root.
#[derive(Clone)]
pub struct Task {
    name: String,
    inputs: Vec<String>,
    output: Utf8PathBuf,
    notify: Option<Reload>,
    func: TaskFnPtr,
}

impl Task {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&TaskContext) -> TaskResult + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            inputs: Vec::new(),
            output: Utf8PathBuf::new(),
            notify: None,
            func: Arc::new(func),
        }
    }

    /// Adds an input glob, e.g. `img/**/*.svg` or `!img/sprite.svg`.
    pub fn input(mut self, glob: impl Into<String>) -> Self {
        self.inputs.push(glob.into());
        self
    }

    pub fn output(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.output = dir.into();
        self
    }

    /// Signal live-reload clients after every successful run.
    pub fn notify(mut self, reload: Reload) -> Self {
        self.notify = Some(reload);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }
}

impl Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .field("output", &self.output)
            .field("notify", &self.notify)
            .finish_non_exhaustive()
    }
}

/// A file matched by one of the task's input globs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Input {
    /// Full path to the file.
    pub path: Utf8PathBuf,
    /// Path relative to the static base of the glob which matched it, so
    /// `img/**/*.png` maps `img/icons/a.png` to `icons/a.png`.
    pub relative: Utf8PathBuf,
}

/// Everything a transform gets to see while running.
pub struct TaskContext<'a> {
    pub name: &'a str,
    /// Files matched by the task's inputs, sorted by path.
    pub files: Vec<Input>,
    /// Directory the task writes into.
    pub output: Utf8PathBuf,
    pub env: &'a Environment,
}

/// Outcome of a successful task run.
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub name: String,
    pub files: usize,
    pub duration: Duration,
}

/// Run a single task against the orchestrator's source and output roots.
pub(crate) fn run(orchestrator: &Orchestrator, task: &Task) -> Result<TaskReport, Error> {
    let span = tracing::span!(Level::INFO, "task", name = task.name());
    span.pb_set_style(&TASK_STYLE);
    span.pb_set_message(&format!("Running {}", task.name()));
    let _enter = span.enter();

    let start = Instant::now();
    let files = expand(orchestrator.source(), &task.inputs)?;

    let context = TaskContext {
        name: &task.name,
        files,
        output: orchestrator.output().join(&task.output),
        env: orchestrator.environment(),
    };

    let files = (task.func)(&context).map_err(|cause| Error::TaskExecution {
        task: task.name.clone(),
        cause,
    })?;

    if let Some(reload) = task.notify {
        orchestrator.notify(reload);
    }

    let duration = start.elapsed();
    tracing::info!(files, "finished {} {}", task.name, crate::io::as_overhead(start));

    Ok(TaskReport {
        name: task.name.clone(),
        files,
        duration,
    })
}

/// Expand input globs under `root`, dropping anything matched by a negated
/// pattern.
pub(crate) fn expand(root: &Utf8Path, inputs: &[String]) -> Result<Vec<Input>, Error> {
    let mut include = Vec::new();
    let mut exclude = Vec::new();

    for input in inputs {
        match input.strip_prefix('!') {
            Some(negated) => {
                for glob in expand_braces(negated) {
                    exclude.push(Pattern::new(&glob)?);
                }
            }
            None => include.extend(expand_braces(input)),
        }
    }

    let escaped = Pattern::escape(root.as_str());
    let mut files = Vec::new();

    for glob in include {
        let base = glob_base(&glob);
        let pattern = format!("{escaped}/{glob}");

        for path in glob::glob_with(&pattern, MATCH_OPTIONS)? {
            let path = Utf8PathBuf::try_from(path?)?;
            if !path.is_file() {
                continue;
            }

            let Ok(from_root) = path.strip_prefix(root) else {
                continue;
            };

            if exclude
                .iter()
                .any(|p| p.matches_with(from_root.as_str(), MATCH_OPTIONS))
            {
                continue;
            }

            let relative = from_root
                .strip_prefix(&base)
                .unwrap_or(from_root)
                .to_path_buf();

            files.push(Input { path, relative });
        }
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    files.dedup_by(|a, b| a.path == b.path);

    Ok(files)
}

/// Expand `{a,b}` alternatives, which `glob` does not understand, into
/// separate patterns.
pub(crate) fn expand_braces(glob: &str) -> Vec<String> {
    let Some(open) = glob.find('{') else {
        return vec![glob.to_string()];
    };
    let Some(close) = glob[open..].find('}').map(|i| open + i) else {
        return vec![glob.to_string()];
    };

    let (head, tail) = (&glob[..open], &glob[close + 1..]);
    glob[open + 1..close]
        .split(',')
        .flat_map(|alt| expand_braces(&format!("{head}{alt}{tail}")))
        .collect()
}

/// The leading components of a glob that contain no wildcards.
pub(crate) fn glob_base(glob: &str) -> Utf8PathBuf {
    let path = Utf8Path::new(glob);
    let components: Vec<_> = path.components().collect();

    let split_idx = components
        .iter()
        .position(|c| c.as_str().contains(['*', '?', '[', '{']))
        .unwrap_or(components.len().saturating_sub(1));

    components.iter().take(split_idx).collect()
}
