//! Workflow state for one user request.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Watcher verdict carried between nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WatcherStatus {
    #[default]
    Pass,
    Warn,
    Fail,
    Interrupted,
}

impl WatcherStatus {
    /// Parse a verdict label, case-insensitively; `RETRY` is a legacy `FAIL`
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_uppercase().as_str() {
            "PASS" => Some(Self::Pass),
            "WARN" => Some(Self::Warn),
            "FAIL" | "RETRY" => Some(Self::Fail),
            "INTERRUPTED" => Some(Self::Interrupted),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Warn => "WARN",
            Self::Fail => "FAIL",
            Self::Interrupted => "INTERRUPTED",
        }
    }
}

impl fmt::Display for WatcherStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Graph nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Node {
    Router,
    Cleaner,
    FeatureEngineer,
    Visualizer,
    Trainer,
    Watcher,
    End,
}

impl Node {
    pub fn name(&self) -> &'static str {
        match self {
            Node::Router => "router",
            Node::Cleaner => "cleaner",
            Node::FeatureEngineer => "feature_engineer",
            Node::Visualizer => "visualizer",
            Node::Trainer => "trainer",
            Node::Watcher => "watcher",
            Node::End => "END",
        }
    }

    /// Prefix of this node's transcript entries
    pub fn transcript_label(&self) -> &'static str {
        match self {
            Node::Router => "Router",
            Node::Cleaner => "Cleaner",
            Node::FeatureEngineer => "FE",
            Node::Visualizer => "Visualizer",
            Node::Trainer => "Trainer",
            Node::Watcher => "Watcher",
            Node::End => "End",
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Router task assignments; `None` means the worker is skipped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPlan {
    pub cleaner_task: Option<String>,
    pub fe_task: Option<String>,
    pub viz_task: Option<String>,
    pub trainer_task: Option<String>,
}

impl TaskPlan {
    pub fn task(&self, node: Node) -> Option<&str> {
        match node {
            Node::Cleaner => self.cleaner_task.as_deref(),
            Node::FeatureEngineer => self.fe_task.as_deref(),
            Node::Visualizer => self.viz_task.as_deref(),
            Node::Trainer => self.trainer_task.as_deref(),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cleaner_task.is_none()
            && self.fe_task.is_none()
            && self.viz_task.is_none()
            && self.trainer_task.is_none()
    }

    pub fn to_json(&self) -> Value {
        json!({
            "cleaner_task": self.cleaner_task,
            "fe_task": self.fe_task,
            "viz_task": self.viz_task,
            "trainer_task": self.trainer_task,
        })
    }
}

/// Append-only execution history, shared by concurrently running nodes
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn append(&self, entry: impl Into<String>) {
        self.entries.lock().await.push(entry.into());
    }

    pub async fn last(&self) -> Option<String> {
        self.entries.lock().await.last().cloned()
    }

    pub async fn snapshot(&self) -> Vec<String> {
        self.entries.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// One entry per line
    pub async fn render(&self) -> String {
        self.entries.lock().await.join("\n")
    }
}

pub struct WorkflowState {
    pub user_request: String,
    pub original_task: String,
    pub plan: TaskPlan,
    pub messages: Transcript,
    pub last_agent: Option<String>,
    pub watcher_status: WatcherStatus,
    pub watcher_feedback: String,
    /// Router replies shown to the user, one per Router round
    pub chat_responses: Vec<String>,
    pub replans: usize,
    pub steps: usize,
}

impl WorkflowState {
    pub fn new(request: impl Into<String>) -> Self {
        let request = request.into();
        Self {
            user_request: request.clone(),
            original_task: request,
            plan: TaskPlan::default(),
            messages: Transcript::new(),
            last_agent: None,
            watcher_status: WatcherStatus::Pass,
            watcher_feedback: String::new(),
            chat_responses: Vec::new(),
            replans: 0,
            steps: 0,
        }
    }

    /// Task text for `node`, wrapped with the Watcher feedback after a FAIL
    pub fn task_for(&self, node: Node) -> Option<String> {
        let task = self.plan.task(node)?;
        if self.watcher_status == WatcherStatus::Fail {
            Some(format!(
                "FEEDBACK_FROM_WATCHER: {}\n\nORIGINAL_TASK: {}",
                self.watcher_feedback, task
            ))
        } else {
            Some(task.to_string())
        }
    }

    /// A FAIL is answered once its feedback has reached the replanned workers
    pub fn feedback_delivered(&mut self) {
        if self.watcher_status == WatcherStatus::Fail {
            self.watcher_status = WatcherStatus::Pass;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse() {
        assert_eq!(WatcherStatus::parse("pass"), Some(WatcherStatus::Pass));
        assert_eq!(WatcherStatus::parse(" Warn "), Some(WatcherStatus::Warn));
        assert_eq!(WatcherStatus::parse("retry"), Some(WatcherStatus::Fail));
        assert_eq!(WatcherStatus::parse("FAIL"), Some(WatcherStatus::Fail));
        assert_eq!(WatcherStatus::parse("maybe"), None);
    }

    #[test]
    fn test_task_wrapping_after_fail() {
        let mut state = WorkflowState::new("clean the data");
        state.plan.cleaner_task = Some("drop nulls".to_string());
        assert_eq!(state.task_for(Node::Cleaner).as_deref(), Some("drop nulls"));

        state.watcher_status = WatcherStatus::Fail;
        state.watcher_feedback = "nulls remain in price".to_string();
        assert_eq!(
            state.task_for(Node::Cleaner).as_deref(),
            Some("FEEDBACK_FROM_WATCHER: nulls remain in price\n\nORIGINAL_TASK: drop nulls")
        );
        assert_eq!(state.task_for(Node::Trainer), None);

        state.feedback_delivered();
        assert_eq!(state.watcher_status, WatcherStatus::Pass);
        assert_eq!(state.task_for(Node::Cleaner).as_deref(), Some("drop nulls"));

        state.watcher_status = WatcherStatus::Interrupted;
        state.feedback_delivered();
        assert_eq!(state.watcher_status, WatcherStatus::Interrupted);
    }

    #[test]
    fn test_plan_json_has_every_key() {
        let plan = TaskPlan {
            viz_task: Some("plot".to_string()),
            ..TaskPlan::default()
        };
        let json = plan.to_json();
        assert_eq!(json["viz_task"], "plot");
        assert!(json["cleaner_task"].is_null());
        assert_eq!(json.as_object().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_transcript_order() {
        let transcript = Transcript::new();
        transcript.append("Router Decision: {}").await;
        transcript.append("Cleaner: done").await;
        assert_eq!(transcript.last().await.as_deref(), Some("Cleaner: done"));
        assert_eq!(transcript.render().await, "Router Decision: {}\nCleaner: done");
    }
}
