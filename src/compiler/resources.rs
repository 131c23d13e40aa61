//! Resource collection and aliasing.
//!
//! Walks the schedule and assigns every resource a physical slot. A freshly
//! produced transient attachment reuses the lowest slot of the same resource
//! type whose resources are all dead by then. Anything else gets a slot of its
//! own.

use std::collections::HashMap;
use std::sync::Arc;

use crate::workflow::graph::WorkflowGraph;
use crate::workflow::operation::OperationId;
use crate::workflow::resource::ResourceId;
use crate::workflow::resource_type::ResourceType;
use crate::workflow::transition::TransitionKinds;

/// One physical resource and the logical resources mapped onto it.
#[derive(Debug, Clone)]
pub struct PhysicalSlot {
    pub resource_type: Arc<ResourceType>,
    pub resources: Vec<ResourceId>,
    pub frame_buffer_index: Option<u32>,
}

/// Result of resource collection.
#[derive(Debug, Clone, Default)]
pub struct ResourceAllocation {
    pub slots: Vec<PhysicalSlot>,
    slot_of: HashMap<ResourceId, usize>,
    frame_buffer_slots: Vec<usize>,
}

impl ResourceAllocation {
    pub fn slot(&self, resource: ResourceId) -> Option<usize> {
        self.slot_of.get(&resource).copied()
    }

    /// Frame buffer image index of an attachment resource.
    pub fn frame_buffer_index(&self, resource: ResourceId) -> Option<u32> {
        self.slot(resource)
            .and_then(|slot| self.slots[slot].frame_buffer_index)
    }

    /// Slots backed by frame buffer images with their slot index, in frame buffer order.
    pub fn frame_buffer_slots(&self) -> impl Iterator<Item = (usize, &PhysicalSlot)> {
        self.frame_buffer_slots
            .iter()
            .map(|&slot| (slot, &self.slots[slot]))
    }

    /// The resource that held `resource`'s slot right before it, if it was aliased.
    pub fn aliased_predecessor(&self, resource: ResourceId) -> Option<ResourceId> {
        let resources = &self.slots[self.slot(resource)?].resources;
        let position = resources.iter().position(|&r| r == resource)?;
        position.checked_sub(1).map(|previous| resources[previous])
    }

    pub fn frame_buffer_count(&self) -> usize {
        self.frame_buffer_slots.len()
    }

    fn allocate(&mut self, resource: ResourceId, resource_type: Arc<ResourceType>) -> usize {
        let slot = self.slots.len();
        self.slots.push(PhysicalSlot {
            resource_type,
            resources: vec![resource],
            frame_buffer_index: None,
        });
        self.slot_of.insert(resource, slot);
        slot
    }

    fn alias(&mut self, resource: ResourceId, slot: usize) {
        self.slots[slot].resources.push(resource);
        self.slot_of.insert(resource, slot);
    }
}

/// Lifetime facts about resources relative to a schedule.
struct Lifetimes<'a> {
    graph: &'a WorkflowGraph,
    position: HashMap<OperationId, usize>,
}

impl<'a> Lifetimes<'a> {
    fn new(graph: &'a WorkflowGraph, schedule: &[OperationId]) -> Self {
        let position = schedule
            .iter()
            .enumerate()
            .map(|(i, &op)| (op, i))
            .collect();
        Self { graph, position }
    }

    fn is_generated(&self, resource: ResourceId) -> bool {
        self.graph.producer(resource).is_some()
    }

    /// True when every consumer of `resource` runs before schedule position `at`.
    ///
    /// Resources nobody reads and persistent resources never die.
    fn is_done(&self, resource: ResourceId, at: usize) -> bool {
        if self.graph.resource(resource).resource_type.persistent {
            return false;
        }
        let mut consumers = self
            .graph
            .resource_io(resource, TransitionKinds::ALL_INPUTS)
            .peekable();
        if consumers.peek().is_none() {
            return false;
        }
        consumers.all(|t| {
            self.position
                .get(&t.operation)
                .map_or(false, |&p| p < at)
        })
    }
}

/// Assign physical slots to every resource touched by the schedule.
pub fn collect_resources(graph: &WorkflowGraph, schedule: &[OperationId]) -> ResourceAllocation {
    let lifetimes = Lifetimes::new(graph, schedule);
    let mut allocation = ResourceAllocation::default();

    for (position, &operation) in schedule.iter().enumerate() {
        for input in graph.operation_io(operation, TransitionKinds::ALL_INPUTS) {
            if allocation.slot(input.resource).is_some() || lifetimes.is_generated(input.resource) {
                continue;
            }
            let resource = graph.resource(input.resource);
            let slot = allocation.allocate(input.resource, resource.resource_type.clone());
            log::debug!(
                "RenderWorkflow : external input {} gets slot {}",
                resource.name,
                slot
            );
        }

        for output in graph.operation_io(operation, TransitionKinds::ALL_OUTPUTS) {
            if allocation.slot(output.resource).is_some() {
                continue;
            }
            let resource = graph.resource(output.resource);
            let resource_type = &resource.resource_type;

            let candidate = if resource_type.is_attachment() && !resource_type.persistent {
                allocation.slots.iter().position(|slot| {
                    slot.resource_type.type_name == resource_type.type_name
                        && slot.resources.iter().all(|&r| {
                            lifetimes.is_generated(r) && lifetimes.is_done(r, position)
                        })
                })
            } else {
                None
            };

            match candidate {
                Some(slot) => {
                    log::debug!(
                        "RenderWorkflow : resource {} aliased onto slot {}",
                        resource.name,
                        slot
                    );
                    allocation.alias(output.resource, slot);
                }
                None => {
                    allocation.allocate(output.resource, resource_type.clone());
                }
            }
        }
    }

    let mut next_index = 0u32;
    for (slot_index, slot) in allocation.slots.iter_mut().enumerate() {
        if slot.resource_type.is_attachment() {
            slot.frame_buffer_index = Some(next_index);
            allocation.frame_buffer_slots.push(slot_index);
            next_index += 1;
        }
    }

    allocation
}
