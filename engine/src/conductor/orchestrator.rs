//! The workflow run loop.
//!
//! A run walks a frontier of nodes starting at the Router. Every node but the
//! Visualizer/Trainer fan-out runs alone; the fan-out runs concurrently and
//! appends to the shared transcript as each branch finishes.

use super::evaluator::Evaluator;
use super::graph::{entry_nodes, route_after_watcher};
use super::interrupt::InterruptHandle;
use super::planner::Planner;
use super::state::{Node, WatcherStatus, WorkflowState};
use crate::agent::{Worker, WorkerRole, WorkerSettings};
use crate::config::WorkflowConfig;
use crate::llm::LLMRouter;
use crate::memory::{HotMemory, WarmMemory};
use crate::tools::ToolRegistry;
use futures::future::join_all;
use sdk::errors::EngineError;
use std::sync::Arc;
use tracing::{info, warn};

/// Result text of a worker stopped by the user
pub const INTERRUPTED_TEXT: &str = "Task interrupted by user.";

#[derive(Debug, Clone, Copy)]
pub struct WorkflowLimits {
    pub max_replans: usize,
    pub max_steps: usize,
}

impl Default for WorkflowLimits {
    fn default() -> Self {
        Self {
            max_replans: 3,
            max_steps: 25,
        }
    }
}

impl From<&WorkflowConfig> for WorkflowLimits {
    fn from(config: &WorkflowConfig) -> Self {
        Self {
            max_replans: config.max_replans,
            max_steps: config.max_steps,
        }
    }
}

/// The four experts plus the Watcher, all on one Warm session
pub struct Crew {
    pub cleaner: Worker,
    pub feature_engineer: Worker,
    pub visualizer: Worker,
    pub trainer: Worker,
    pub evaluator: Evaluator,
}

impl Crew {
    /// Build every worker with the current project context
    pub fn assemble(
        hot: &HotMemory,
        router: &Arc<LLMRouter>,
        tools: &ToolRegistry,
        memory: &WarmMemory,
        settings: WorkerSettings,
        interrupt: &InterruptHandle,
    ) -> Self {
        let build = |role: WorkerRole| {
            Worker::for_role(
                role,
                hot,
                Arc::clone(router),
                tools,
                memory.clone(),
                settings,
            )
            .with_interrupt(interrupt.clone())
        };

        Self {
            cleaner: build(WorkerRole::Cleaner),
            feature_engineer: build(WorkerRole::FeatureEngineer),
            visualizer: build(WorkerRole::Visualizer),
            trainer: build(WorkerRole::Trainer),
            evaluator: Evaluator::new(build(WorkerRole::Watcher)),
        }
    }

    pub fn worker(&self, node: Node) -> Option<&Worker> {
        match node {
            Node::Cleaner => Some(&self.cleaner),
            Node::FeatureEngineer => Some(&self.feature_engineer),
            Node::Visualizer => Some(&self.visualizer),
            Node::Trainer => Some(&self.trainer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkflowOutcome {
    /// Router replies in order
    pub chat_responses: Vec<String>,
    pub transcript: Vec<String>,
    pub status: WatcherStatus,
    pub steps: usize,
    pub replans: usize,
    /// Set when a limit cut the run short
    pub stopped_early: Option<String>,
}

impl WorkflowOutcome {
    pub fn interrupted(&self) -> bool {
        self.status == WatcherStatus::Interrupted
    }
}

pub struct Orchestrator {
    planner: Planner,
    crew: Crew,
    limits: WorkflowLimits,
    interrupt: InterruptHandle,
}

impl Orchestrator {
    pub fn new(
        planner: Planner,
        crew: Crew,
        limits: WorkflowLimits,
        interrupt: InterruptHandle,
    ) -> Self {
        Self {
            planner,
            crew,
            limits,
            interrupt,
        }
    }

    pub fn crew(&self) -> &Crew {
        &self.crew
    }

    /// Run `request` until the graph reaches End.
    ///
    /// Only provider exhaustion is an error; interruption ends the run with
    /// status INTERRUPTED.
    pub async fn run(&self, request: &str) -> Result<WorkflowOutcome, EngineError> {
        let mut state = WorkflowState::new(request);
        state.messages.append(request).await;

        let mut frontier = vec![Node::Router];
        let mut stopped_early = None;

        while !frontier.is_empty() {
            if state.steps + frontier.len() > self.limits.max_steps {
                let note = format!(
                    "Workflow stopped: step limit ({}) reached.",
                    self.limits.max_steps
                );
                warn!("{}", note);
                state.messages.append(note.clone()).await;
                stopped_early = Some(note);
                break;
            }
            state.steps += frontier.len();

            frontier = match frontier.as_slice() {
                [Node::Router] => {
                    if state.watcher_status == WatcherStatus::Fail {
                        state.replans += 1;
                        if state.replans > self.limits.max_replans {
                            let note = format!(
                                "Workflow stopped: replan limit ({}) reached after repeated FAIL verdicts.",
                                self.limits.max_replans
                            );
                            warn!("{}", note);
                            state.messages.append(note.clone()).await;
                            stopped_early = Some(note);
                            break;
                        }
                        info!("Replanning after FAIL ({}/{})", state.replans, self.limits.max_replans);
                    }
                    self.router_node(&mut state).await?
                }
                [Node::Watcher] => self.watcher_node(&mut state).await?,
                [node] => self.expert_node(*node, &mut state).await?,
                nodes => {
                    self.fan_out(nodes, &mut state).await?;
                    Vec::new()
                }
            };
        }

        Ok(WorkflowOutcome {
            chat_responses: state.chat_responses,
            transcript: state.messages.snapshot().await,
            status: state.watcher_status,
            steps: state.steps,
            replans: state.replans,
            stopped_early,
        })
    }

    async fn router_node(&self, state: &mut WorkflowState) -> Result<Vec<Node>, EngineError> {
        let decision = tokio::select! {
            decision = self.planner.decide(state) => decision?,
            _ = self.interrupt.cancelled() => {
                warn!("Router interrupted");
                state.watcher_status = WatcherStatus::Interrupted;
                return Ok(Vec::new());
            }
        };

        state.plan = decision.plan;
        state.chat_responses.push(decision.chat_response);
        state
            .messages
            .append(format!("Router Decision: {}", state.plan.to_json()))
            .await;

        Ok(entry_nodes(&state.plan))
    }

    /// Run one expert; `Err` only for fatal errors
    async fn run_worker(
        &self,
        node: Node,
        task: Option<String>,
    ) -> Result<(String, bool), EngineError> {
        let (Some(worker), Some(task)) = (self.crew.worker(node), task) else {
            return Ok((format!("No task assigned to {}.", node), false));
        };
        match worker.run_task(&task).await {
            Ok(text) => Ok((text, false)),
            Err(EngineError::Interrupted) => Ok((INTERRUPTED_TEXT.to_string(), true)),
            Err(e) => Err(e),
        }
    }

    async fn expert_node(
        &self,
        node: Node,
        state: &mut WorkflowState,
    ) -> Result<Vec<Node>, EngineError> {
        let (text, interrupted) = self.run_worker(node, state.task_for(node)).await?;
        state.feedback_delivered();
        state
            .messages
            .append(format!("{}: {}", node.transcript_label(), text))
            .await;

        if interrupted {
            state.watcher_status = WatcherStatus::Interrupted;
            return Ok(Vec::new());
        }

        match node {
            Node::Cleaner | Node::FeatureEngineer => {
                state.last_agent = Some(node.name().to_string());
                Ok(vec![Node::Watcher])
            }
            // Visualizer and Trainer results go straight to the user
            _ => Ok(Vec::new()),
        }
    }

    async fn fan_out(&self, nodes: &[Node], state: &mut WorkflowState) -> Result<(), EngineError> {
        info!(
            "Running {} in parallel",
            nodes.iter().map(Node::name).collect::<Vec<_>>().join(" + ")
        );

        let jobs: Vec<(Node, Option<String>)> =
            nodes.iter().map(|&node| (node, state.task_for(node))).collect();
        state.feedback_delivered();
        let transcript = state.messages.clone();

        let branches = jobs.into_iter().map(|(node, task)| {
            let transcript = transcript.clone();
            async move {
                let (text, interrupted) = self.run_worker(node, task).await?;
                transcript
                    .append(format!("{}: {}", node.transcript_label(), text))
                    .await;
                Ok::<bool, EngineError>(interrupted)
            }
        });

        let mut first_error = None;
        for result in join_all(branches).await {
            match result {
                Ok(true) => state.watcher_status = WatcherStatus::Interrupted,
                Ok(false) => {}
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn watcher_node(&self, state: &mut WorkflowState) -> Result<Vec<Node>, EngineError> {
        let last = state.messages.last().await.unwrap_or_default();
        let verdict = self.crew.evaluator.review(&last).await?;

        if verdict.status == WatcherStatus::Fail {
            warn!(
                "Watcher FAIL for {}: {}",
                state.last_agent.as_deref().unwrap_or("unknown"),
                verdict.feedback
            );
        }

        state.watcher_status = verdict.status;
        state.watcher_feedback = verdict.feedback;
        state
            .messages
            .append(format!(
                "Watcher: {} - {}",
                state.watcher_status, state.watcher_feedback
            ))
            .await;

        Ok(route_after_watcher(state))
    }
}
