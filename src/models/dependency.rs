use serde::{Deserialize, Serialize};

/// Directed ordering edge: `task_id` cannot start before `dependency_id`
/// ends. Owned by the source task and cascade-deleted with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDependency {
    pub task_id: String,
    pub dependency_id: String,
}

impl TaskDependency {
    pub fn new(task_id: impl Into<String>, dependency_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            dependency_id: dependency_id.into(),
        }
    }
}
