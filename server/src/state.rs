use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex};

use llm_core::{ChatBackend, ConversationLog};
use lru::LruCache;
use tokio::sync::Mutex as TokioMutex;

use crate::config::ServerConfig;
use crate::error::ApiError;

/// Whether the chat endpoint can be reached at all.
#[derive(Clone)]
pub enum LlmStatus {
    Ready(Arc<dyn ChatBackend>),
    /// Startup could not build a client; the message says what to fix.
    Unconfigured(String),
}

impl LlmStatus {
    pub fn backend(&self) -> Result<Arc<dyn ChatBackend>, ApiError> {
        match self {
            LlmStatus::Ready(backend) => Ok(backend.clone()),
            LlmStatus::Unconfigured(msg) => Err(ApiError::NotConfigured(msg.clone())),
        }
    }
}

pub type Session = Arc<TokioMutex<ConversationLog>>;

struct Sessions {
    /// Conversations with at least one committed turn.
    committed: LruCache<String, Session>,
    /// Sessions whose first turn is still running.
    pending: HashMap<String, Session>,
}

/// One conversation log per id. Each log sits behind its own async mutex,
/// held for a whole turn, so a conversation never has two requests in flight.
/// A conversation becomes visible only once a turn has committed to it.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Mutex<Sessions>>,
}

impl SessionStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(Mutex::new(Sessions {
                committed: LruCache::new(capacity),
                pending: HashMap::new(),
            })),
        }
    }

    fn sessions(&self) -> std::sync::MutexGuard<'_, Sessions> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Take the session for `id` for the length of a turn. Unknown ids get a
    /// fresh pending session shared by every concurrent turn on that id.
    pub fn checkout(&self, id: &str) -> SessionLease {
        let mut sessions = self.sessions();
        let committed = sessions.committed.get(id).cloned();
        let session = match committed {
            Some(session) => session,
            None => sessions.pending.entry(id.to_string()).or_default().clone(),
        };
        SessionLease {
            store: self.clone(),
            id: id.to_string(),
            session,
        }
    }

    /// Committed conversation, if any.
    pub fn get(&self, id: &str) -> Option<Session> {
        self.sessions().committed.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.sessions().committed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn commit(&self, id: &str, session: &Session) {
        let mut sessions = self.sessions();
        if sessions.pending.get(id).is_some_and(|s| Arc::ptr_eq(s, session)) {
            sessions.pending.remove(id);
        }
        let current = sessions.committed.get(id).is_some_and(|s| Arc::ptr_eq(s, session));
        if !current {
            sessions.committed.put(id.to_string(), session.clone());
        }
    }

    fn release(&self, id: &str, session: &Session) {
        let mut sessions = self.sessions();
        // Clones are only handed out under this lock, so a count of two
        // (the map and this lease) means nobody else is waiting on it.
        let unused = sessions
            .pending
            .get(id)
            .is_some_and(|s| Arc::ptr_eq(s, session) && Arc::strong_count(s) == 2);
        if unused {
            sessions.pending.remove(id);
        }
    }
}

/// A session checked out for one turn. Dropping it without [`commit`]
/// (failure or cancellation) forgets a never-committed conversation.
///
/// [`commit`]: SessionLease::commit
pub struct SessionLease {
    store: SessionStore,
    id: String,
    session: Session,
}

impl SessionLease {
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Make the conversation visible and mark it most recently used.
    pub fn commit(&self) {
        self.store.commit(&self.id, &self.session);
    }
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        self.store.release(&self.id, &self.session);
    }
}

#[derive(Clone)]
pub struct AppState {
    pub llm: LlmStatus,
    pub sessions: SessionStore,
    pub request_count: Arc<AtomicU64>,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(llm: LlmStatus, config: ServerConfig) -> Self {
        Self {
            llm,
            sessions: SessionStore::new(config.max_conversations),
            request_count: Arc::new(AtomicU64::new(0)),
            config,
        }
    }
}
