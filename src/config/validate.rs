// src/config/validate.rs

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{Catalog, RawCatalog};
use crate::errors::{DuodagError, Result};

impl TryFrom<RawCatalog> for Catalog {
    type Error = crate::errors::DuodagError;

    fn try_from(raw: RawCatalog) -> std::result::Result<Self, Self::Error> {
        validate_raw_catalog(&raw)?;
        Ok(Catalog::new_unchecked(raw.dispatcher, raw.actuator, raw.task))
    }
}

/// Run every catalog check; first failure wins.
pub fn validate_raw_catalog(cfg: &RawCatalog) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_dispatcher_settings(cfg)?;
    validate_task_dependencies(cfg)?;
    validate_programs(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawCatalog) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(DuodagError::ConfigError(
            "catalog must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_dispatcher_settings(cfg: &RawCatalog) -> Result<()> {
    let d = &cfg.dispatcher;

    if d.monitor_interval_ms == 0 || d.idle_interval_ms == 0 || d.dependency_poll_ms == 0 {
        return Err(DuodagError::ConfigError(
            "[dispatcher] poll intervals must be >= 1 ms".to_string(),
        ));
    }

    if d.stuck_timeout_secs == 0 {
        return Err(DuodagError::ConfigError(
            "[dispatcher].stuck_timeout_secs must be >= 1 (got 0)".to_string(),
        ));
    }

    Ok(())
}

fn validate_task_dependencies(cfg: &RawCatalog) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            if dep == name {
                return Err(DuodagError::ConfigError(format!(
                    "task '{}' cannot depend on itself in `after`",
                    name
                )));
            }
            if !cfg.task.contains_key(dep) {
                return Err(DuodagError::ConfigError(format!(
                    "task '{}' has unknown dependency '{}' in `after`",
                    name, dep
                )));
            }
        }
    }
    Ok(())
}

/// Program ids are matched case-insensitively, so they must be unique that way.
fn validate_programs(cfg: &RawCatalog) -> Result<()> {
    let mut seen: HashMap<String, &str> = HashMap::new();

    for (name, task) in cfg.task.iter() {
        let Some(program) = task.program.as_deref() else {
            continue;
        };

        let key = program.trim().to_lowercase();
        if key.is_empty() {
            return Err(DuodagError::ConfigError(format!(
                "task '{}' has an empty `program`",
                name
            )));
        }

        if let Some(other) = seen.insert(key, name.as_str()) {
            return Err(DuodagError::ConfigError(format!(
                "program '{}' is used by both '{}' and '{}'",
                program, other, name
            )));
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawCatalog) -> Result<()> {
    // Edge direction: dep -> task
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.task.keys() {
        graph.add_node(name.as_str());
    }

    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => {
            let node = cycle.node_id();
            Err(DuodagError::DagCycle(format!(
                "cycle detected in task dependencies involving task '{}'",
                node
            )))
        }
    }
}
