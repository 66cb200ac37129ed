use std::collections::HashMap;
use std::sync::Arc;

use crate::{Error, Task};

/// Name → task mapping. Names are unique, iteration follows registration
/// order.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    order: Vec<String>,
    tasks: HashMap<String, Arc<Task>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, task: Task) -> Result<(), Error> {
        let name = task.name().to_string();
        if self.tasks.contains_key(&name) {
            return Err(Error::DuplicateTask(name));
        }

        tracing::debug!("registered task {name}");
        self.order.push(name.clone());
        self.tasks.insert(name, Arc::new(task));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&Arc<Task>, Error> {
        self.tasks
            .get(name)
            .ok_or_else(|| Error::UnknownTask(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
