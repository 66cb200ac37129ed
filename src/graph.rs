//! Composition of tasks into sequential and parallel groups.
//!
//! A [`Node`] is either a single task, looked up by name when executed, or a
//! group of child nodes with an execution mode:
//!
//! * **Sequence**: children run in declared order on the calling thread. The
//!   first failure stops the group and is returned as is.
//! * **Parallel**: children are fanned out onto the rayon pool. Nothing is
//!   cancelled when a child fails, every sibling runs to completion, and the
//!   group then reports all failures together.

use std::time::Duration;

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::task::TaskReport;
use crate::{Error, Orchestrator, Registry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Task(String),
    Sequence(Vec<Node>),
    Parallel(Vec<Node>),
}

impl Node {
    pub fn task(name: impl Into<String>) -> Self {
        Node::Task(name.into())
    }

    pub fn sequence(children: impl IntoIterator<Item = Node>) -> Self {
        Node::Sequence(children.into_iter().collect())
    }

    pub fn parallel(children: impl IntoIterator<Item = Node>) -> Self {
        Node::Parallel(children.into_iter().collect())
    }

    /// Every task name referenced by this node, depth first.
    pub fn tasks(&self) -> Vec<&str> {
        match self {
            Node::Task(name) => vec![name.as_str()],
            Node::Sequence(children) | Node::Parallel(children) => {
                children.iter().flat_map(Node::tasks).collect()
            }
        }
    }

    /// Fails with the first name missing from `registry`.
    pub fn validate(&self, registry: &Registry) -> Result<(), Error> {
        for name in self.tasks() {
            registry.get(name)?;
        }
        Ok(())
    }
}

/// Reports of every task that ran, in declared order.
#[derive(Debug, Default, Clone)]
pub struct Report {
    pub tasks: Vec<TaskReport>,
}

impl Report {
    pub fn files(&self) -> usize {
        self.tasks.iter().map(|t| t.files).sum()
    }

    pub fn duration(&self) -> Duration {
        self.tasks.iter().map(|t| t.duration).sum()
    }

    fn merge(&mut self, other: Report) {
        self.tasks.extend(other.tasks);
    }
}

pub(crate) fn execute(orchestrator: &Orchestrator, node: &Node) -> Result<Report, Error> {
    match node {
        Node::Task(name) => {
            let task = orchestrator.registry().get(name)?;
            let report = crate::task::run(orchestrator, task)?;
            Ok(Report {
                tasks: vec![report],
            })
        }
        Node::Sequence(children) => {
            let mut report = Report::default();
            for child in children {
                report.merge(execute(orchestrator, child)?);
            }
            Ok(report)
        }
        Node::Parallel(children) => {
            // Collecting into a Vec of results keeps rayon from short
            // circuiting, so every child finishes before we look at errors.
            let results: Vec<_> = children
                .par_iter()
                .map(|child| execute(orchestrator, child))
                .collect();

            let mut report = Report::default();
            let mut errors = Vec::new();

            for result in results {
                match result {
                    Ok(ok) => report.merge(ok),
                    Err(e) => errors.push(e),
                }
            }

            match errors.len() {
                0 => Ok(report),
                1 => Err(errors.remove(0)),
                _ => Err(Error::Parallel(errors)),
            }
        }
    }
}
