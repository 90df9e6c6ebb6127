//! External-ID canonicalization.
//!
//! Canonical forms (colon-separated, exactly):
//! - `project:<projectKey>`
//! - `workitem:<projectKey>:<workItemKey>`
//! - `task:<projectKey>:<workItemKey>:<taskKey>`
//!
//! Bare (non-colonized) inputs are promoted using the ambient parent keys.
//! Key components may not contain `:`; a colonized input whose parent keys
//! disagree with the ambient ones is rejected.

use serde::{Deserialize, Serialize};
use sk_domain::error::{Error, Result};

/// The three Super-Kanban entity levels a session can bind to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Project,
    WorkItem,
    Task,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Project => "PROJECT",
            EntityType::WorkItem => "WORK_ITEM",
            EntityType::Task => "TASK",
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn check_key_component(component: &str, what: &str) -> Result<()> {
    if component.is_empty() {
        return Err(Error::InvalidExternalId(format!("empty {what} key")));
    }
    if component.contains(':') {
        return Err(Error::InvalidExternalId(format!(
            "{what} key may not contain ':': {component:?}"
        )));
    }
    Ok(())
}

/// Canonicalize a project external ID.
///
/// Accepts `p1` or `project:p1`; anything else colonized is rejected.
pub fn canonicalize_project_external_id(input: &str) -> Result<String> {
    let input = input.trim();
    if let Some(rest) = input.strip_prefix("project:") {
        check_key_component(rest, "project")?;
        return Ok(format!("project:{rest}"));
    }
    if input.contains(':') {
        return Err(Error::InvalidExternalId(format!(
            "not a project external id: {input:?}"
        )));
    }
    check_key_component(input, "project")?;
    Ok(format!("project:{input}"))
}

/// Canonicalize a work-item external ID against the ambient project key.
///
/// Fails iff the input has a colon and does not match
/// `workitem:<projectKey>:<workItemKey>`.
pub fn canonicalize_work_item_external_id(input: &str, project_key: &str) -> Result<String> {
    let input = input.trim();
    check_key_component(project_key, "project")?;

    if let Some(rest) = input.strip_prefix("workitem:") {
        let (declared_project, work_item_key) =
            rest.split_once(':').ok_or_else(|| {
                Error::InvalidExternalId(format!("malformed work-item external id: {input:?}"))
            })?;
        if declared_project != project_key {
            return Err(Error::InvalidExternalId(format!(
                "work-item project {declared_project:?} does not match {project_key:?}"
            )));
        }
        check_key_component(work_item_key, "work-item")?;
        return Ok(format!("workitem:{project_key}:{work_item_key}"));
    }
    if input.contains(':') {
        return Err(Error::InvalidExternalId(format!(
            "not a work-item external id: {input:?}"
        )));
    }
    check_key_component(input, "work-item")?;
    Ok(format!("workitem:{project_key}:{input}"))
}

/// Canonicalize a task external ID against the ambient project and
/// work-item keys.
pub fn canonicalize_task_external_id(
    input: &str,
    project_key: &str,
    work_item_key: &str,
) -> Result<String> {
    let input = input.trim();
    check_key_component(project_key, "project")?;
    check_key_component(work_item_key, "work-item")?;

    if let Some(rest) = input.strip_prefix("task:") {
        let parts: Vec<&str> = rest.split(':').collect();
        if parts.len() != 3 {
            return Err(Error::InvalidExternalId(format!(
                "malformed task external id: {input:?}"
            )));
        }
        if parts[0] != project_key || parts[1] != work_item_key {
            return Err(Error::InvalidExternalId(format!(
                "task parents {}:{} do not match {project_key}:{work_item_key}",
                parts[0], parts[1]
            )));
        }
        check_key_component(parts[2], "task")?;
        return Ok(format!("task:{project_key}:{work_item_key}:{}", parts[2]));
    }
    if input.contains(':') {
        return Err(Error::InvalidExternalId(format!(
            "not a task external id: {input:?}"
        )));
    }
    check_key_component(input, "task")?;
    Ok(format!("task:{project_key}:{work_item_key}:{input}"))
}
