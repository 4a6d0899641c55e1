//! Processing-node interface.
//!
//! A node is handed a [`NodeContext`] once per tick. Through it the node pulls
//! pending input blocks (`receive_read_only` / `receive_writable`), allocates
//! fresh blocks, and transmits results to whatever is connected downstream.
//! Nodes never see the graph or each other directly.

use alloc::vec::Vec;
use core::any::Any;
use core::ops::Range;

use crate::block::{AudioBlockMut, AudioBlockRef, BlockPool};

/// Core trait for all audio processing nodes.
///
/// Each node declares a fixed number of inputs and outputs and processes one
/// block per input per tick in [`update`](AudioNode::update).
pub trait AudioNode: Any {
    /// Number of input slots this node accepts.
    fn num_inputs(&self) -> usize;

    /// Number of outputs this node can transmit on.
    fn num_outputs(&self) -> usize;

    /// Process one tick. A node with no pending input simply returns without
    /// transmitting; a node whose allocation fails drops its output for the tick.
    fn update(&mut self, ctx: &mut NodeContext<'_, '_>);

    /// Nodes that consume a tap of the played output return themselves here.
    fn as_loopback_receiver(&mut self) -> Option<&mut dyn LoopbackReceiver> {
        None
    }
}

/// Receiver side of a loopback route.
///
/// The graph hands every block transmitted on the routed output to this method
/// once, right after the transmitting node finishes its update.
pub trait LoopbackReceiver {
    fn receive_loopback(&mut self, block: &AudioBlockRef<'_>);
}

/// Resolved edge: source output to a flat destination slot index.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Route {
    pub(crate) src: usize,
    pub(crate) src_output: usize,
    pub(crate) dst_slot: usize,
}

/// Resolved loopback route: source output to receiving node index.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LoopbackRoute {
    pub(crate) src: usize,
    pub(crate) src_output: usize,
    pub(crate) target: usize,
}

/// Per-tick view of the graph handed to [`AudioNode::update`].
pub struct NodeContext<'a, 'p> {
    pub(crate) pool: &'p BlockPool,
    pub(crate) tick: u32,
    pub(crate) node: usize,
    pub(crate) inputs: Range<usize>,
    pub(crate) slots: &'a mut [Option<AudioBlockRef<'p>>],
    pub(crate) routes: &'a [Route],
    pub(crate) loopbacks: &'a [LoopbackRoute],
    pub(crate) loopback_pending: &'a mut Vec<(usize, AudioBlockRef<'p>)>,
}

impl<'a, 'p> NodeContext<'a, 'p> {
    /// Take the pending block on `input` without gaining the right to modify it.
    /// The contents may be shared with other readers.
    pub fn receive_read_only(&mut self, input: usize) -> Option<AudioBlockRef<'p>> {
        if input >= self.inputs.len() {
            return None;
        }
        self.slots[self.inputs.start + input].take()
    }

    /// Take the pending block on `input` with exclusive access, duplicating it
    /// first if it is shared. Returns `None` if nothing is pending or the copy
    /// could not be allocated.
    pub fn receive_writable(&mut self, input: usize) -> Option<AudioBlockMut<'p>> {
        self.receive_read_only(input)?.into_mut()
    }

    /// Allocate a fresh block stamped with the current tick as its id.
    pub fn allocate(&self) -> Option<AudioBlockMut<'p>> {
        let mut block = self.pool.allocate()?;
        block.set_id(self.tick);
        Some(block)
    }

    /// Hand `block` to every destination connected to `output`.
    ///
    /// Each destination whose input slot is empty takes one reference; an
    /// occupied slot keeps its pending block. The caller still owns (and must
    /// eventually drop) its own reference.
    pub fn transmit(&mut self, block: &AudioBlockRef<'p>, output: usize) {
        for route in self.routes {
            if route.src == self.node && route.src_output == output {
                let slot = &mut self.slots[route.dst_slot];
                if slot.is_none() {
                    *slot = Some(block.clone());
                }
            }
        }
        for route in self.loopbacks {
            if route.src == self.node
                && route.src_output == output
                && self.loopback_pending.len() < self.loopback_pending.capacity()
            {
                self.loopback_pending.push((route.target, block.clone()));
            }
        }
    }

    /// Number of the tick being processed; source nodes use it as the block id.
    pub fn tick(&self) -> u32 {
        self.tick
    }

    /// The pool blocks are drawn from.
    pub fn pool(&self) -> &'p BlockPool {
        self.pool
    }
}
