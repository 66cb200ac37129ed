//! Watch mode maps file-change events to task runs.
//!
//! Filesystem events from `notify` are pushed onto a channel and a single
//! loop ([`WatchController::run`]) consumes them in arrival order. For each
//! changed path every matching [`WatchRule`] is dispatched: its task runs,
//! and when the task succeeds the rule's reload signal goes out to connected
//! browsers. Events are not debounced, each one is dispatched on its own.
//! Task failures are logged and the loop keeps going.

use std::collections::HashSet;
use std::sync::mpsc::{Receiver, channel};

use camino::{Utf8Path, Utf8PathBuf};
use glob::Pattern;
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::WatchError;
use crate::task::{MATCH_OPTIONS, expand_braces, glob_base};
use crate::{Error, Orchestrator, Reload};

/// Binds a glob, relative to the source root, to the work done when a
/// matching file changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchRule {
    pattern: String,
    task: Option<String>,
    notify: Option<Reload>,
}

impl WatchRule {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            task: None,
            notify: None,
        }
    }

    /// Re-run this registered task on every match.
    pub fn run(mut self, task: impl Into<String>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Signal live-reload clients once the task (if any) succeeded.
    pub fn notify(mut self, reload: Reload) -> Self {
        self.notify = Some(reload);
        self
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

struct Compiled {
    rule: WatchRule,
    patterns: Vec<Pattern>,
}

impl Compiled {
    fn matches(&self, path: &Utf8Path) -> bool {
        self.patterns
            .iter()
            .any(|p| p.matches_with(path.as_str(), MATCH_OPTIONS))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    Watching,
}

pub struct WatchController<'a> {
    orchestrator: &'a Orchestrator,
    state: WatchState,
    rules: Vec<Compiled>,
    roots: Vec<Utf8PathBuf>,
    _watcher: Option<RecommendedWatcher>,
}

impl<'a> WatchController<'a> {
    pub fn new(orchestrator: &'a Orchestrator) -> Self {
        Self {
            orchestrator,
            state: WatchState::Idle,
            rules: Vec::new(),
            roots: Vec::new(),
            _watcher: None,
        }
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    /// Compile `rules` and move to [`WatchState::Watching`] without subscribing
    /// to the filesystem. Events are then fed to [`Self::run`] by the caller.
    pub fn arm(&mut self, rules: Vec<WatchRule>) -> Result<(), Error> {
        if self.state == WatchState::Watching {
            return Err(WatchError::AlreadyWatching.into());
        }

        let registry = self.orchestrator.registry();
        let mut compiled = Vec::with_capacity(rules.len());

        for rule in rules {
            if let Some(task) = &rule.task {
                registry.get(task)?;
            }

            let patterns = expand_braces(&rule.pattern)
                .iter()
                .map(|glob| Pattern::new(glob))
                .collect::<Result<_, _>>()?;

            compiled.push(Compiled { rule, patterns });
        }

        self.roots = compiled
            .iter()
            .flat_map(|c| expand_braces(&c.rule.pattern))
            .map(|glob| self.orchestrator.source().join(glob_base(&glob)))
            .collect();
        self.rules = compiled;
        self.state = WatchState::Watching;

        Ok(())
    }

    /// Arm the controller and subscribe a recursive watcher to the static
    /// root of every rule. The returned receiver yields filesystem events.
    pub fn start(
        &mut self,
        rules: Vec<WatchRule>,
    ) -> Result<Receiver<notify::Result<Event>>, Error> {
        self.arm(rules)?;

        let (tx, rx) = channel();
        let mut watcher = notify::recommended_watcher(tx).map_err(WatchError::from)?;

        let roots = collapse_watch_paths(self.roots.iter().cloned().collect());
        for path in roots {
            tracing::info!("watching {path}");
            watcher
                .watch(path.as_std_path(), RecursiveMode::Recursive)
                .map_err(WatchError::from)?;
        }

        self._watcher = Some(watcher);
        Ok(rx)
    }

    /// Consume events until the channel closes, returning how many rule
    /// dispatches happened.
    pub fn run(&self, events: Receiver<notify::Result<Event>>) -> usize {
        let mut dispatched = 0;

        for event in events {
            match event {
                Ok(event) => dispatched += self.handle(&event),
                Err(e) => tracing::error!("watch error: {e:?}"),
            }
        }

        dispatched
    }

    /// Dispatch every rule matching the paths of one event.
    pub fn handle(&self, event: &Event) -> usize {
        if !is_content_change(&event.kind) {
            return 0;
        }

        let mut dispatched = 0;
        for path in &event.paths {
            let Some(path) = self.relative(path) else {
                continue;
            };

            for compiled in self.rules.iter().filter(|c| c.matches(&path)) {
                tracing::info!("{path} changed, matched {}", compiled.rule.pattern);
                self.dispatch(&compiled.rule);
                dispatched += 1;
            }
        }

        dispatched
    }

    fn dispatch(&self, rule: &WatchRule) {
        if let Some(task) = &rule.task
            && let Err(e) = self.orchestrator.run_task(task)
        {
            tracing::error!("{e}");
            return;
        }

        if let Some(reload) = rule.notify {
            self.orchestrator.notify(reload);
        }
    }

    /// Path of a changed file relative to the source root.
    fn relative(&self, path: &std::path::Path) -> Option<Utf8PathBuf> {
        let path = Utf8Path::from_path(path)?;
        let source = self.orchestrator.source();

        if let Ok(relative) = path.strip_prefix(source) {
            return Some(relative.to_path_buf());
        }

        // notify reports canonical paths, the configured root may not be
        let canonical = source.canonicalize_utf8().ok()?;
        path.strip_prefix(&canonical).ok().map(Utf8Path::to_path_buf)
    }
}

fn is_content_change(kind: &EventKind) -> bool {
    match kind {
        EventKind::Create(_) | EventKind::Remove(_) => true,
        EventKind::Modify(ModifyKind::Metadata(_)) => false,
        EventKind::Modify(_) => true,
        _ => false,
    }
}

/// Reduces a set of paths to the minimal set of watch roots.
///
/// If we watch `/a` and `/a/b`, we only need to watch `/a` because
/// the watcher is recursive. This function sorts the paths and filters
/// out any path that is a subdirectory of a previously accepted path.
fn collapse_watch_paths(paths: HashSet<Utf8PathBuf>) -> Vec<Utf8PathBuf> {
    let mut paths: Vec<_> = paths.into_iter().collect();
    paths.sort();

    let mut filtered: Vec<Utf8PathBuf> = Vec::new();
    for path in paths {
        if let Some(last) = filtered.last()
            && path.starts_with(last)
        {
            continue;
        }
        filtered.push(path);
    }

    filtered
}
