//! Sliding-window conversation history
//!
//! Holds the turns sent to the model each call. The window is capped; once
//! full, the oldest turn is evicted first so the sequence stays in order.

use crate::types::Turn;

#[derive(Debug, Clone)]
pub struct ConversationHistory {
    turns: Vec<Turn>,
    limit: usize,
}

impl ConversationHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            turns: Vec::new(),
            limit,
        }
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
        if self.limit > 0 && self.turns.len() > self.limit {
            let excess = self.turns.len() - self.limit;
            self.turns.drain(..excess);
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
