#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod config;
mod error;
mod graph;
pub mod io;
pub mod loader;
mod orchestrator;
pub mod pipeline;
mod registry;
mod reload;
mod task;
mod utils;

#[cfg(feature = "live")]
mod hub;
#[cfg(feature = "server")]
mod serve;
#[cfg(feature = "live")]
mod watch;

pub use crate::config::{Config, ServeOptions};
pub use crate::error::*;
pub use crate::graph::{Node, Report};
pub use crate::orchestrator::Orchestrator;
pub use crate::registry::Registry;
pub use crate::reload::{Reload, script as reload_script};
pub use crate::task::{Input, Task, TaskContext, TaskReport, TaskResult};
pub use crate::utils::init_logging;

#[cfg(feature = "live")]
pub use crate::hub::{HubStatus, ReloadHub};
#[cfg(feature = "server")]
pub use crate::serve::{Dashboard, serve};
#[cfg(feature = "live")]
pub use crate::watch::{WatchController, WatchRule, WatchState};

/// This value controls whether the orchestrator runs in the `Build` or the
/// `Watch` mode. In `Build` mode, the graph runs once and the process exits.
/// In `Watch` mode, the output is served over HTTP, the sources are watched
/// for changes, and the affected tasks re-run and signal connected browsers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Build,
    Watch,
}

/// Data available to every task while it runs.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    /// Orchestrator mode.
    pub mode: Mode,
    /// Live-reload socket port, only set while watching.
    pub port: Option<u16>,
}

impl Environment {
    /// The live-reload client script, when there's a socket to connect to.
    pub fn reload_script(&self) -> Option<String> {
        match (self.mode, self.port) {
            (Mode::Watch, Some(port)) => Some(reload_script(port)),
            _ => None,
        }
    }
}
