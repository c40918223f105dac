//! Turning a generator round-trip into ordinary object commands
//!
//! The pipeline reads one graph snapshot, awaits the generator without
//! holding any state, and converts the response into `ObjectCommand`s that
//! the caller applies like any other edit. Nothing is written here.

use super::cancel::CancellationToken;
use super::traits::{GenerationError, Generator};
use super::types::{ChildProposal, ConnectionProposal, GenerationKind, GenerationRequest, GenerationResponse};
use crate::error::{ArborError, ArborResult};
use crate::graph::{Connection, NodeId, NodeUpdate, ObjectGenerationRecord, ObjectGraph, ObjectNode};
use crate::query::ContextAssembler;
use crate::workspace::ObjectCommand;
use tracing::{debug, warn};

/// Default upper bound on children accepted from one request
pub const DEFAULT_MAX_CHILDREN: usize = 12;

/// Node type given to proposed children that do not name one
pub const DEFAULT_CHILD_TYPE: &str = "item";

/// Commands derived from one generator response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationPlan {
    pub commands: Vec<ObjectCommand>,
    /// Ids of nodes the plan adds, in order
    pub generated: Vec<NodeId>,
    /// Proposals discarded (over the child limit, blank, or naming no node)
    pub dropped_proposals: usize,
    pub cancelled: bool,
}

/// Builds requests and interprets responses
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationPipeline {
    model_id: Option<String>,
    max_children: usize,
}

impl Default for GenerationPipeline {
    fn default() -> Self {
        Self {
            model_id: None,
            max_children: DEFAULT_MAX_CHILDREN,
        }
    }
}

impl GenerationPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }

    pub fn with_max_children(mut self, max_children: usize) -> Self {
        self.max_children = max_children;
        self
    }

    /// Build the request for `node_id`, rendering its context bundle
    pub fn prepare(
        &self,
        graph: &ObjectGraph,
        node_id: &NodeId,
        kind: GenerationKind,
        prompt: &str,
    ) -> ArborResult<GenerationRequest> {
        let bundle = ContextAssembler::new(graph)
            .full_context_bundle(node_id)
            .ok_or_else(|| ArborError::precondition(format!("node {} is not in the graph", node_id)))?;
        Ok(GenerationRequest {
            node_id: node_id.clone(),
            kind,
            prompt: prompt.to_string(),
            context: bundle.render(),
            model_id: self.model_id.clone(),
            max_children: (kind == GenerationKind::Children).then_some(self.max_children),
        })
    }

    /// Call the generator and plan the resulting commands.
    ///
    /// Cancellation before or during the call yields a cancelled plan: for
    /// children requests it holds only a generation record with no
    /// generated ids; otherwise it is empty. A response arriving after
    /// cancellation is discarded.
    pub async fn run<G: Generator + ?Sized>(
        &self,
        generator: &G,
        graph: &ObjectGraph,
        node_id: &NodeId,
        kind: GenerationKind,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> ArborResult<GenerationPlan> {
        let request = self.prepare(graph, node_id, kind, prompt)?;
        if cancel.is_cancelled() {
            return Ok(self.cancelled_plan(&request));
        }

        let outcome = tokio::select! {
            result = generator.generate(&request) => result,
            _ = cancel.cancelled() => Err(GenerationError::Cancelled),
        };

        match outcome {
            Err(GenerationError::Cancelled) => Ok(self.cancelled_plan(&request)),
            Err(e) => Err(e.into()),
            Ok(_) if cancel.is_cancelled() => Ok(self.cancelled_plan(&request)),
            Ok(response) => Ok(self.plan(graph, &request, response)?),
        }
    }

    /// Convert a response into commands against `graph`
    pub fn plan(
        &self,
        graph: &ObjectGraph,
        request: &GenerationRequest,
        response: GenerationResponse,
    ) -> Result<GenerationPlan, GenerationError> {
        if response.kind() != request.kind {
            return Err(GenerationError::InvalidResponse(format!(
                "asked for {}, got {}",
                request.kind,
                response.kind()
            )));
        }
        let plan = match response {
            GenerationResponse::Children(children) => self.plan_children(request, children),
            GenerationResponse::Description(text) => GenerationPlan {
                commands: vec![ObjectCommand::UpdateNode {
                    id: request.node_id.clone(),
                    update: NodeUpdate::new().description(text),
                }],
                ..GenerationPlan::default()
            },
            GenerationResponse::Properties(properties) => GenerationPlan {
                commands: properties
                    .into_iter()
                    .map(|(key, value)| ObjectCommand::SetProperty {
                        node: request.node_id.clone(),
                        key,
                        value,
                    })
                    .collect(),
                ..GenerationPlan::default()
            },
            GenerationResponse::Connections(proposals) => self.plan_connections(graph, request, proposals),
        };
        debug!(
            node = %request.node_id,
            kind = %request.kind,
            commands = plan.commands.len(),
            dropped = plan.dropped_proposals,
            "planned generation"
        );
        Ok(plan)
    }

    fn plan_children(&self, request: &GenerationRequest, children: Vec<ChildProposal>) -> GenerationPlan {
        let total = children.len();
        let accepted: Vec<ChildProposal> = children
            .into_iter()
            .filter(|c| !c.name.trim().is_empty())
            .take(self.max_children)
            .collect();

        let mut plan = GenerationPlan {
            dropped_proposals: total - accepted.len(),
            ..GenerationPlan::default()
        };
        for proposal in accepted {
            let node_type = proposal.node_type.unwrap_or_else(|| DEFAULT_CHILD_TYPE.to_string());
            let mut node = ObjectNode::new(proposal.name.trim(), node_type).generated_from(&request.prompt);
            node.description = proposal.description;
            plan.generated.push(node.id.clone());
            plan.commands.push(ObjectCommand::AddNode {
                node,
                parent: Some(request.node_id.clone()),
            });
        }
        if plan.dropped_proposals > 0 {
            warn!(node = %request.node_id, dropped = plan.dropped_proposals, "dropped child proposals");
        }
        plan.commands.push(ObjectCommand::RecordGeneration {
            record: self.record(request, plan.generated.clone()),
        });
        plan
    }

    fn plan_connections(
        &self,
        graph: &ObjectGraph,
        request: &GenerationRequest,
        proposals: Vec<ConnectionProposal>,
    ) -> GenerationPlan {
        let mut plan = GenerationPlan::default();
        for proposal in proposals {
            let target = resolve_target(graph, &proposal.target).filter(|t| *t != request.node_id);
            let Some(target) = target else {
                warn!(node = %request.node_id, target = %proposal.target, "connection proposal names no node; dropped");
                plan.dropped_proposals += 1;
                continue;
            };
            let mut connection = Connection::new(target, proposal.role)
                .with_strength(proposal.strength)
                .generated_from(&request.prompt);
            connection.description = proposal.description;
            plan.commands.push(ObjectCommand::AddConnection {
                node: request.node_id.clone(),
                connection,
            });
        }
        plan
    }

    fn cancelled_plan(&self, request: &GenerationRequest) -> GenerationPlan {
        debug!(node = %request.node_id, kind = %request.kind, "generation cancelled");
        let commands = match request.kind {
            GenerationKind::Children => vec![ObjectCommand::RecordGeneration {
                record: self.record(request, Vec::new()),
            }],
            _ => Vec::new(),
        };
        GenerationPlan {
            commands,
            cancelled: true,
            ..GenerationPlan::default()
        }
    }

    fn record(&self, request: &GenerationRequest, generated: Vec<NodeId>) -> ObjectGenerationRecord {
        let record = ObjectGenerationRecord::new(request.node_id.clone(), request.prompt.clone()).with_generated(generated);
        match &self.model_id {
            Some(model) => record.with_model(model.clone()),
            None => record,
        }
    }
}

/// Resolve a proposal target: an exact node id first, then the first node
/// in traversal order whose name matches case-insensitively.
fn resolve_target(graph: &ObjectGraph, target: &str) -> Option<NodeId> {
    let as_id = NodeId::from(target);
    if graph.contains(&as_id) {
        return Some(as_id);
    }
    let wanted = target.trim().to_lowercase();
    graph
        .traversal_order()
        .into_iter()
        .find(|n| n.name.to_lowercase() == wanted)
        .map(|n| n.id.clone())
}
