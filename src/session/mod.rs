//! Per-connection session state and lifecycle

pub mod accounting;
pub mod engine;
pub mod registry;

pub use engine::{EngineSignal, SessionEngine};
pub use registry::SessionRegistry;

use crate::agent::ConversationHistory;
use crate::providers::AgentProfile;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

/// Identity of one connection, fixed at accept time.
#[derive(Debug, Clone)]
pub struct SessionMeta {
    pub connection_id: String,
    pub user_id: Option<String>,
    pub agent_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub started_instant: Instant,
}

impl SessionMeta {
    pub fn new(connection_id: String, user_id: Option<String>, agent_id: Option<String>) -> Self {
        Self {
            connection_id,
            user_id,
            agent_id,
            started_at: Utc::now(),
            started_instant: Instant::now(),
        }
    }
}

/// Cross-task flags shared between the engine loop and its pipeline task.
#[derive(Clone, Default)]
pub struct SessionFlags {
    processing: Arc<AtomicBool>,
    interrupted: Arc<AtomicBool>,
}

impl SessionFlags {
    /// Claim the single processing slot. Returns false if a pipeline is
    /// already running.
    pub fn try_begin_processing(&self) -> bool {
        self.processing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn end_processing(&self) {
        self.processing.store(false, Ordering::SeqCst);
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
    }

    pub fn clear_interrupt(&self) {
        self.interrupted.store(false, Ordering::SeqCst);
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }
}

/// Dialog-side state mutated by pipeline turns.
pub struct DialogState {
    pub history: ConversationHistory,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub synthesis_chars: u64,
    pub call_id: Option<String>,
}

impl DialogState {
    pub fn new(history_limit: usize) -> Self {
        Self {
            history: ConversationHistory::new(history_limit),
            tokens_in: 0,
            tokens_out: 0,
            synthesis_chars: 0,
            call_id: None,
        }
    }
}

/// Everything a session carries across its tasks.
#[derive(Clone)]
pub struct Session {
    pub meta: SessionMeta,
    pub profile: Arc<AgentProfile>,
    pub dialog: Arc<Mutex<DialogState>>,
    pub flags: SessionFlags,
}

impl Session {
    pub fn new(meta: SessionMeta, profile: AgentProfile, history_limit: usize) -> Self {
        Self {
            meta,
            profile: Arc::new(profile),
            dialog: Arc::new(Mutex::new(DialogState::new(history_limit))),
            flags: SessionFlags::default(),
        }
    }
}
