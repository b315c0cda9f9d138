//! Outbox table for a module.
//!
//! Each module owns an ordered list of named outboxes. An outbox is a queue
//! plus, when the assembler wired it, the downstream module that drains it.
//! Order is declaration order and is the order traversal visits edges in.

use crate::tray::id::{ModuleId, QueueId};

/// One named output edge.
#[derive(Debug, Clone)]
pub struct Outbox {
    pub name: String,
    pub queue: QueueId,
    /// Module whose inbox is `queue`. `None` makes this a discard sink.
    pub downstream: Option<ModuleId>,
    /// Whether the module itself declared this box (as opposed to only
    /// being connected by the assembler).
    pub declared: bool,
}

impl Outbox {
    pub fn is_wired(&self) -> bool {
        self.downstream.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct OutboxTable {
    boxes: Vec<Outbox>,
}

impl OutboxTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a box. Returns `false` if the name is already taken.
    pub fn insert(&mut self, outbox: Outbox) -> bool {
        if self.get(&outbox.name).is_some() {
            return false;
        }
        self.boxes.push(outbox);
        true
    }

    pub fn get(&self, name: &str) -> Option<&Outbox> {
        self.boxes.iter().find(|b| b.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Outbox> {
        self.boxes.iter()
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// `(queue, downstream)` for every wired box, in declaration order.
    pub fn wired_edges(&self) -> Vec<(QueueId, ModuleId)> {
        self.boxes
            .iter()
            .filter_map(|b| b.downstream.map(|d| (b.queue, d)))
            .collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.boxes.iter().map(|b| b.name.as_str()).collect()
    }
}
