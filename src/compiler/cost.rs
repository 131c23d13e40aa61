//! Operation tagging and schedule cost.
//!
//! Graphics operations rendering into attachments of the same geometry share a
//! tag, so they can become subpasses of one render pass. Every compute
//! operation has a tag of its own. A schedule costs a fixed amount per change of
//! tag between neighbouring operations.

use crate::workflow::graph::WorkflowGraph;
use crate::workflow::operation::{OperationId, RenderOperation};
use crate::workflow::resource_type::AttachmentSize;
use crate::workflow::transition::TransitionKinds;

/// Tags of every operation of one graph.
#[derive(Debug, Clone)]
pub struct CostCalculator {
    tags: Vec<u32>,
    tag_switch_cost: f32,
}

impl CostCalculator {
    /// Tag all operations of `graph`, visiting them in registration order.
    pub fn tag_operations(graph: &WorkflowGraph, tag_switch_cost: f32) -> Self {
        let mut tags = Vec::with_capacity(graph.operation_count());
        let mut seen_sizes: Vec<(AttachmentSize, u32)> = Vec::new();
        let mut next_tag = 0u32;

        for (id, operation) in graph.operations() {
            if operation.is_compute() {
                tags.push(next_tag);
                next_tag += 1;
                continue;
            }

            let size = Self::operation_geometry(graph, id, operation);
            let tag = match seen_sizes.iter().find(|(seen, _)| *seen == size) {
                Some(&(_, tag)) => tag,
                None => {
                    let tag = next_tag;
                    next_tag += 1;
                    seen_sizes.push((size, tag));
                    tag
                }
            };
            tags.push(tag);
        }

        Self {
            tags,
            tag_switch_cost,
        }
    }

    /// Geometry a graphics operation renders at.
    ///
    /// Taken from the first attachment it writes, then the first attachment it
    /// reads, then the operation's own size.
    pub fn operation_geometry(
        graph: &WorkflowGraph,
        id: OperationId,
        operation: &RenderOperation,
    ) -> AttachmentSize {
        [
            TransitionKinds::ALL_ATTACHMENT_OUTPUTS,
            TransitionKinds::ATTACHMENT_INPUT,
        ]
        .into_iter()
        .find_map(|kinds| {
            graph
                .operation_io(id, kinds)
                .find_map(|t| graph.resource(t.resource).resource_type.attachment_size())
        })
        .unwrap_or(operation.attachment_size)
    }

    pub fn tag(&self, operation: OperationId) -> u32 {
        self.tags[operation.index()]
    }

    /// Cost of executing operations in the given order.
    pub fn sequence_cost(&self, sequence: &[OperationId]) -> f32 {
        let switches = sequence
            .windows(2)
            .filter(|pair| self.tag(pair[0]) != self.tag(pair[1]))
            .count();
        switches as f32 * self.tag_switch_cost
    }
}
