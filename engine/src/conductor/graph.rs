//! Edges of the workflow graph.

use super::state::{Node, TaskPlan, WatcherStatus, WorkflowState};

/// First node after the Router. Cleaning and feature engineering run before
/// the parallel visualization and training stage.
pub fn route_after_router(plan: &TaskPlan) -> Node {
    if plan.cleaner_task.is_some() {
        Node::Cleaner
    } else if plan.fe_task.is_some() {
        Node::FeatureEngineer
    } else if plan.viz_task.is_some() || plan.trainer_task.is_some() {
        // The fan-out is resolved by `parallel_stage`
        Node::Visualizer
    } else {
        Node::End
    }
}

/// Visualizer and/or Trainer, whichever have a task
pub fn parallel_stage(plan: &TaskPlan) -> Vec<Node> {
    let mut nodes = Vec::with_capacity(2);
    if plan.viz_task.is_some() {
        nodes.push(Node::Visualizer);
    }
    if plan.trainer_task.is_some() {
        nodes.push(Node::Trainer);
    }
    nodes
}

/// Entry nodes of a Router round
pub fn entry_nodes(plan: &TaskPlan) -> Vec<Node> {
    match route_after_router(plan) {
        Node::Visualizer => parallel_stage(plan),
        Node::End => Vec::new(),
        node => vec![node],
    }
}

/// Next nodes once the Watcher has judged the last expert
pub fn route_after_watcher(state: &WorkflowState) -> Vec<Node> {
    match state.watcher_status {
        WatcherStatus::Fail => vec![Node::Router],
        WatcherStatus::Interrupted => Vec::new(),
        WatcherStatus::Pass | WatcherStatus::Warn => match state.last_agent.as_deref() {
            Some(agent) if agent == Node::Cleaner.name() && state.plan.fe_task.is_some() => {
                vec![Node::FeatureEngineer]
            }
            Some(agent) if agent == Node::Cleaner.name() || agent == Node::FeatureEngineer.name() => {
                parallel_stage(&state.plan)
            }
            _ => Vec::new(),
        },
    }
}

/// ASCII picture of the workflow graph
pub fn render_graph() -> String {
    [
        "            +--------+",
        "  request ->| router |<-----------------------+",
        "            +--------+                        |",
        "                |                             | FAIL",
        "      +---------+------------+                |",
        "      v         v            v                |",
        " +---------+ +------------------+             |",
        " | cleaner | | feature_engineer |             |",
        " +---------+ +------------------+             |",
        "      |         |                             |",
        "      +----+----+                             |",
        "           v                                  |",
        "      +---------+                             |",
        "      | watcher |-----------------------------+",
        "      +---------+",
        "           | PASS / WARN",
        "     +-----+------+",
        "     v            v",
        " +------------+ +---------+",
        " | visualizer | | trainer |   (parallel)",
        " +------------+ +---------+",
        "     |            |",
        "     +-----+------+",
        "           v",
        "          END",
    ]
    .join("\n")
}
