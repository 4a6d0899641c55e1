//! Runtime audio graph: node registry, connection edges, and the per-tick scheduler.
//!
//! Nodes run once per [`Graph::update_all`] in registration order (a plain ordered
//! list, no topological sort). A node is active iff it has at least one connection;
//! inactive nodes are skipped. Blocks move between nodes only through the input
//! slots filled by [`NodeContext::transmit`].
//!
//! ```ignore
//! let pool = BlockPool::new(32, AudioSettings::default())?;
//! let mut graph = Graph::new(&pool);
//! let sine = graph.add_node(AudioSynthSine::new());
//! let wdrc = graph.add_node(AudioEffectCompWdrc::new(WdrcParams::default()));
//! let rec = graph.add_node(AudioRecordQueue::new());
//! graph.connect(sine, 0, wdrc, 0)?;
//! graph.connect(wdrc, 0, rec, 0)?;
//!
//! // In the audio interrupt:
//! graph.update_all();
//! ```


use alloc::boxed::Box;
use alloc::vec::Vec;
use core::any::Any;
use core::fmt;

use thiserror::Error;

use crate::block::{AudioBlockRef, BlockPool};
use crate::node::{AudioNode, LoopbackRoute, NodeContext, Route};

/// Identifier of a node inside one [`Graph`], in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Registration index.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.0)
    }
}

/// One edge: `(source, output) -> (destination, input)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Connection {
    pub src: NodeId,
    pub src_output: usize,
    pub dst: NodeId,
    pub dst_input: usize,
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} -> {}:{}",
            self.src, self.src_output, self.dst, self.dst_input
        )
    }
}

/// Errors from building or editing a graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    #[error("{node} has no output {index} (it has {count})")]
    OutputOutOfRange {
        node: NodeId,
        index: usize,
        count: usize,
    },

    #[error("{node} has no input {index} (it has {count})")]
    InputOutOfRange {
        node: NodeId,
        index: usize,
        count: usize,
    },

    #[error("connection {0} already exists")]
    DuplicateConnection(Connection),

    #[error("input {input} of {node} is already connected")]
    InputAlreadyConnected { node: NodeId, input: usize },

    #[error("connection {0} does not exist")]
    NotConnected(Connection),

    #[error("{0} does not accept loopback audio")]
    NotLoopbackReceiver(NodeId),

    #[error("loopback route {src}:{output} -> {target} already exists")]
    DuplicateLoopback {
        src: NodeId,
        output: usize,
        target: NodeId,
    },
}

struct NodeEntry {
    node: Box<dyn AudioNode>,
    first_input: usize,
    num_inputs: usize,
    num_outputs: usize,
    connections: usize,
}

impl NodeEntry {
    fn is_active(&self) -> bool {
        self.connections > 0
    }
}

/// Owns the nodes and their input slots, and schedules one tick at a time.
///
/// All allocation happens while nodes and edges are added; [`update_all`]
/// itself never touches the heap.
///
/// [`update_all`]: Graph::update_all
pub struct Graph<'p> {
    pool: &'p BlockPool,
    nodes: Vec<NodeEntry>,
    connections: Vec<Connection>,
    /// Flat input slots: node `n` owns `first_input..first_input + num_inputs`.
    slots: Vec<Option<AudioBlockRef<'p>>>,
    routes: Vec<Route>,
    loopbacks: Vec<LoopbackRoute>,
    loopback_pending: Vec<(usize, AudioBlockRef<'p>)>,
    tick: u32,
}

impl<'p> Graph<'p> {
    /// Create an empty graph drawing blocks from `pool`.
    pub fn new(pool: &'p BlockPool) -> Self {
        Graph {
            pool,
            nodes: Vec::new(),
            connections: Vec::new(),
            slots: Vec::new(),
            routes: Vec::new(),
            loopbacks: Vec::new(),
            loopback_pending: Vec::new(),
            tick: 0,
        }
    }

    /// Register a node. Nodes run in the order they are added.
    pub fn add_node<N: AudioNode>(&mut self, node: N) -> NodeId {
        let id = NodeId(self.nodes.len());
        let num_inputs = node.num_inputs();
        let num_outputs = node.num_outputs();
        let first_input = self.slots.len();
        self.slots.resize_with(first_input + num_inputs, || None);
        self.nodes.push(NodeEntry {
            node: Box::new(node),
            first_input,
            num_inputs,
            num_outputs,
            connections: 0,
        });
        #[cfg(feature = "tracing")]
        tracing::debug!(%id, num_inputs, num_outputs, "graph_add: node");
        id
    }

    /// Connect `src`'s output `src_output` to `dst`'s input `dst_input`.
    ///
    /// Rejects unknown nodes, out-of-range indices, exact duplicates, and a
    /// second connection into an already connected input.
    pub fn connect(
        &mut self,
        src: NodeId,
        src_output: usize,
        dst: NodeId,
        dst_input: usize,
    ) -> Result<(), GraphError> {
        let conn = Connection {
            src,
            src_output,
            dst,
            dst_input,
        };
        self.check_output(src, src_output)?;
        let dst_slot = self.check_input(dst, dst_input)?;

        if self.connections.contains(&conn) {
            return Err(GraphError::DuplicateConnection(conn));
        }
        if self
            .connections
            .iter()
            .any(|c| c.dst == dst && c.dst_input == dst_input)
        {
            return Err(GraphError::InputAlreadyConnected {
                node: dst,
                input: dst_input,
            });
        }

        self.connections.push(conn);
        self.routes.push(Route {
            src: src.0,
            src_output,
            dst_slot,
        });
        self.nodes[src.0].connections += 1;
        self.nodes[dst.0].connections += 1;
        #[cfg(feature = "tracing")]
        tracing::debug!(%conn, "graph_connect");
        Ok(())
    }

    /// Remove an existing connection. A block still pending in the destination
    /// slot is released, and nodes left without connections become inactive.
    pub fn disconnect(
        &mut self,
        src: NodeId,
        src_output: usize,
        dst: NodeId,
        dst_input: usize,
    ) -> Result<(), GraphError> {
        let conn = Connection {
            src,
            src_output,
            dst,
            dst_input,
        };
        let pos = self
            .connections
            .iter()
            .position(|c| *c == conn)
            .ok_or(GraphError::NotConnected(conn))?;
        let dst_slot = self.nodes[dst.0].first_input + dst_input;

        self.connections.remove(pos);
        self.routes
            .retain(|r| !(r.src == src.0 && r.src_output == src_output && r.dst_slot == dst_slot));
        self.slots[dst_slot] = None;
        self.nodes[src.0].connections -= 1;
        self.nodes[dst.0].connections -= 1;
        #[cfg(feature = "tracing")]
        tracing::debug!(%conn, "graph_disconnect");
        Ok(())
    }

    /// Route every block `src` transmits on `src_output` to `target`'s loopback
    /// interface, once per transmit, right after `src` finishes its update.
    pub fn add_loopback(
        &mut self,
        src: NodeId,
        src_output: usize,
        target: NodeId,
    ) -> Result<(), GraphError> {
        self.check_output(src, src_output)?;
        let entry = self
            .nodes
            .get_mut(target.0)
            .ok_or(GraphError::UnknownNode(target))?;
        if entry.node.as_loopback_receiver().is_none() {
            return Err(GraphError::NotLoopbackReceiver(target));
        }
        if self
            .loopbacks
            .iter()
            .any(|r| r.src == src.0 && r.src_output == src_output && r.target == target.0)
        {
            return Err(GraphError::DuplicateLoopback {
                src,
                output: src_output,
                target,
            });
        }

        self.loopbacks.push(LoopbackRoute {
            src: src.0,
            src_output,
            target: target.0,
        });
        // one pending slot per route; drained after every node update
        self.loopback_pending.reserve_exact(self.loopbacks.len());
        self.nodes[src.0].connections += 1;
        self.nodes[target.0].connections += 1;
        #[cfg(feature = "tracing")]
        tracing::debug!(%src, src_output, %target, "graph_loopback");
        Ok(())
    }

    /// Run one tick: every active node's `update`, in registration order.
    pub fn update_all(&mut self) {
        self.tick = self.tick.wrapping_add(1);
        for index in 0..self.nodes.len() {
            let entry = &mut self.nodes[index];
            if !entry.is_active() {
                continue;
            }
            {
                let mut ctx = NodeContext {
                    pool: self.pool,
                    tick: self.tick,
                    node: index,
                    inputs: entry.first_input..entry.first_input + entry.num_inputs,
                    slots: &mut self.slots,
                    routes: &self.routes,
                    loopbacks: &self.loopbacks,
                    loopback_pending: &mut self.loopback_pending,
                };
                entry.node.update(&mut ctx);
            }
            for (target, block) in self.loopback_pending.drain(..) {
                if let Some(receiver) = self.nodes[target].node.as_loopback_receiver() {
                    receiver.receive_loopback(&block);
                }
            }
        }
    }

    /// Whether `id` has at least one connection (and therefore runs each tick).
    pub fn is_active(&self, id: NodeId) -> bool {
        self.nodes.get(id.0).is_some_and(NodeEntry::is_active)
    }

    /// Typed shared access to a registered node.
    pub fn node<T: AudioNode>(&self, id: NodeId) -> Option<&T> {
        let node: &dyn Any = &*self.nodes.get(id.0)?.node;
        node.downcast_ref::<T>()
    }

    /// Typed mutable access to a registered node, for parameter changes between ticks.
    pub fn node_mut<T: AudioNode>(&mut self, id: NodeId) -> Option<&mut T> {
        let node: &mut dyn Any = &mut *self.nodes.get_mut(id.0)?.node;
        node.downcast_mut::<T>()
    }

    /// Number of registered nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All current connections, in the order they were made.
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Number of ticks run so far. Equals the id of blocks sourced in the last tick.
    pub fn tick_count(&self) -> u32 {
        self.tick
    }

    /// Number of input slots currently holding a pending block.
    pub fn pending_blocks(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Release every pending input block (e.g. before reconfiguring the graph).
    pub fn clear_pending(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = None);
    }

    pub fn pool(&self) -> &'p BlockPool {
        self.pool
    }

    fn check_output(&self, node: NodeId, index: usize) -> Result<(), GraphError> {
        let entry = self.nodes.get(node.0).ok_or(GraphError::UnknownNode(node))?;
        if index >= entry.num_outputs {
            return Err(GraphError::OutputOutOfRange {
                node,
                index,
                count: entry.num_outputs,
            });
        }
        Ok(())
    }

    fn check_input(&self, node: NodeId, index: usize) -> Result<usize, GraphError> {
        let entry = self.nodes.get(node.0).ok_or(GraphError::UnknownNode(node))?;
        if index >= entry.num_inputs {
            return Err(GraphError::InputOutOfRange {
                node,
                index,
                count: entry.num_inputs,
            });
        }
        Ok(entry.first_input + index)
    }
}
