use std::sync::mpsc::Sender;
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};

use crate::task::TaskReport;
use crate::{Environment, Error, Node, Registry, Reload, Report, Task};

/// Owns the task registry, the source and output roots, and the channel to
/// live-reload listeners. Every operation goes through an explicit value of
/// this type, so independent orchestrators can live side by side.
#[derive(Debug)]
pub struct Orchestrator {
    source: Utf8PathBuf,
    output: Utf8PathBuf,
    registry: Registry,
    env: Environment,
    notifier: Option<Sender<Reload>>,
}

impl Orchestrator {
    pub fn new(source: impl Into<Utf8PathBuf>, output: impl Into<Utf8PathBuf>) -> Self {
        Self {
            source: source.into(),
            output: output.into(),
            registry: Registry::new(),
            env: Environment::default(),
            notifier: None,
        }
    }

    pub fn source(&self) -> &Utf8Path {
        &self.source
    }

    pub fn output(&self) -> &Utf8Path {
        &self.output
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn set_environment(&mut self, env: Environment) {
        self.env = env;
    }

    pub fn register(&mut self, task: Task) -> Result<(), Error> {
        self.registry.register(task)
    }

    /// Route reload signals into `sender`, replacing any previous listener.
    pub fn set_notifier(&mut self, sender: Sender<Reload>) {
        self.notifier = Some(sender);
    }

    /// Signal live-reload listeners, if any are attached.
    pub fn notify(&self, reload: Reload) {
        if let Some(sender) = &self.notifier
            && sender.send(reload).is_err()
        {
            tracing::warn!("live-reload listener is gone, dropping {reload:?}");
        }
    }

    /// Delete the output tree.
    pub fn clean(&self) -> Result<usize, Error> {
        crate::io::clean(&self.output)
    }

    pub fn run_task(&self, name: &str) -> Result<TaskReport, Error> {
        let task = self.registry.get(name)?;
        crate::task::run(self, task)
    }

    /// Validate and run a task graph.
    pub fn execute(&self, node: &Node) -> Result<Report, Error> {
        node.validate(&self.registry)?;

        let s = Instant::now();
        let report = crate::graph::execute(self, node)?;

        tracing::info!(
            "finished {} tasks, {} files processed {}",
            report.tasks.len(),
            report.files(),
            crate::io::as_overhead(s)
        );

        Ok(report)
    }

    /// Build once with `node`, then serve the output and re-run tasks as
    /// the sources change. Returns only if the file watcher goes away.
    #[cfg(all(feature = "live", feature = "server"))]
    pub fn dev(
        &mut self,
        node: &Node,
        rules: Vec<crate::WatchRule>,
        options: &crate::ServeOptions,
    ) -> Result<(), Error> {
        use crate::{Dashboard, Mode, ReloadHub, WatchController};

        let hub = ReloadHub::start(options.notify)?;

        self.set_environment(Environment {
            mode: Mode::Watch,
            port: Some(hub.port()),
        });
        self.set_notifier(hub.sender());

        tracing::info!("running initial build...");
        self.execute(node)?;

        let dashboard = options.ui.then(|| Dashboard {
            tasks: self.registry.names().map(str::to_string).collect(),
            hub: hub.status(),
        });
        let _http = crate::serve(self.output.clone(), options, dashboard)?;

        let mut controller = WatchController::new(self);
        let events = controller.start(rules)?;

        tracing::info!("initial build completed, now watching for changes...");
        let dispatched = controller.run(events);
        tracing::info!("watcher closed after {dispatched} dispatches");

        Ok(())
    }
}
