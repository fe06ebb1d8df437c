//! Conversation lanes
//!
//! A lane is the per-conversation FIFO ordering unit: an ordered queue of
//! task ids plus a single active-task marker. Lanes are created lazily on
//! first submission and retired once drained, so memory stays bounded under
//! many short-lived conversations.

use std::collections::{HashMap, VecDeque};

use uuid::Uuid;

#[derive(Debug, Default)]
struct Lane {
    queue: VecDeque<Uuid>,
    active: bool,
}

/// All lanes plus the global pending count used for admission control.
///
/// Mutated only inside short critical sections; the backend call never runs
/// under this lock.
#[derive(Debug, Default)]
pub struct LaneMap {
    lanes: HashMap<String, Lane>,
    pending: usize,
}

impl LaneMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tasks queued across all lanes, excluding active ones.
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Live lanes (queued or active work).
    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    /// Queue depth for one conversation.
    pub fn depth(&self, conversation_id: &str) -> usize {
        self.lanes
            .get(conversation_id)
            .map(|l| l.queue.len())
            .unwrap_or(0)
    }

    /// Append a task to its conversation's lane, creating the lane lazily.
    /// Returns the lane depth after the push.
    pub fn push(&mut self, conversation_id: &str, task_id: Uuid) -> usize {
        let lane = self.lanes.entry(conversation_id.to_string()).or_default();
        lane.queue.push_back(task_id);
        self.pending += 1;
        lane.queue.len()
    }

    /// Claim the head of any eligible lane (non-empty queue, no active
    /// marker), marking it active. FIFO within a lane is preserved because
    /// only the head is ever claimable.
    pub fn claim_next(&mut self) -> Option<(String, Uuid)> {
        for (conversation_id, lane) in self.lanes.iter_mut() {
            if !lane.active {
                if let Some(task_id) = lane.queue.pop_front() {
                    lane.active = true;
                    self.pending -= 1;
                    return Some((conversation_id.clone(), task_id));
                }
            }
        }
        None
    }

    /// Release a lane's active marker after its task finished. Retires the
    /// lane when drained; returns true when the lane still has queued work
    /// (its head just became eligible).
    pub fn release(&mut self, conversation_id: &str) -> bool {
        match self.lanes.get_mut(conversation_id) {
            Some(lane) => {
                lane.active = false;
                if lane.queue.is_empty() {
                    self.lanes.remove(conversation_id);
                    false
                } else {
                    true
                }
            }
            None => false,
        }
    }

    /// Remove a still-queued task (pending cancel). Returns false if the
    /// task was already claimed.
    pub fn remove_queued(&mut self, conversation_id: &str, task_id: Uuid) -> bool {
        let Some(lane) = self.lanes.get_mut(conversation_id) else {
            return false;
        };
        let Some(pos) = lane.queue.iter().position(|id| *id == task_id) else {
            return false;
        };
        lane.queue.remove(pos);
        self.pending -= 1;
        if lane.queue.is_empty() && !lane.active {
            self.lanes.remove(conversation_id);
        }
        true
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
