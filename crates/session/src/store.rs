//! The single authoritative session of a running client.
//!
//! `SessionStore` owns the in-memory [`Session`] and its persisted copy. It is
//! created once per client (explicitly, no global state) and shared as
//! `Arc<SessionStore>` between the facade, the router bridge and the HTTP
//! client.
//!
//! Async completions are guarded by an operation generation: every
//! superseding operation (login, logout) bumps it, and a completion only
//! commits if the generation it started under is still current. The check and
//! the write happen under the same lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use mandir_auth::{Claims, Role, Session, User};
use mandir_core::{EntityId, TenantId};

use crate::error::StorageError;
use crate::storage::{KeyValueStore, keys};

/// Generation an async operation started under.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Generation(u64);

/// What the HTTP client needs to decorate outgoing requests.
pub trait RequestCredentials: Send + Sync {
    fn bearer_token(&self) -> Option<String>;

    fn tenant_id(&self) -> Option<TenantId>;
}

#[derive(Debug, Default)]
struct State {
    session: Session,
    /// Correlation id of the current login, for logs and request headers.
    session_id: Option<Uuid>,
}

pub struct SessionStore {
    state: Mutex<State>,
    storage: Arc<dyn KeyValueStore>,
    generation: AtomicU64,
}

impl core::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionStore")
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Empty (anonymous) session backed by `storage`. Nothing is read.
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            state: Mutex::new(State::default()),
            storage,
            generation: AtomicU64::new(0),
        }
    }

    /// Rebuild the session persisted in `storage` (page reload / app start).
    pub fn restore(storage: Arc<dyn KeyValueStore>) -> Self {
        Self::restore_at(storage, Utc::now())
    }

    /// Like [`SessionStore::restore`], evaluating token expiry at `now`.
    ///
    /// Unreadable entries are treated as absent. A partial session (token
    /// without user or the reverse) or an expired token restores as anonymous
    /// and the persisted copy is erased.
    pub fn restore_at(storage: Arc<dyn KeyValueStore>, now: DateTime<Utc>) -> Self {
        let store = Self::new(storage);
        let session = store.read_persisted();

        if session.token.is_none() && session.user.is_none() {
            return store;
        }

        if !session.is_authenticated() {
            tracing::warn!("persisted session is incomplete; starting anonymous");
            store.clear();
            return store;
        }

        if session.claims.is_expired(now) {
            tracing::info!("persisted token has expired; starting anonymous");
            store.clear();
            return store;
        }

        tracing::info!(role = %session.role(), "session restored from storage");
        if let Ok(mut state) = store.lock() {
            state.session = session;
            state.session_id = Some(Uuid::now_v7());
        }
        store
    }

    fn read_persisted(&self) -> Session {
        let token = self.read_key(keys::AUTH_TOKEN).filter(|t| !t.trim().is_empty());
        let user = self.read_key(keys::USER_DATA).and_then(|raw| {
            serde_json::from_str::<User>(&raw)
                .map_err(|e| tracing::warn!(error = %e, "persisted user data is corrupt; ignoring"))
                .ok()
        });
        let claims = token.as_deref().map(Claims::from_token).unwrap_or_default();

        let assigned_tenant_id = self
            .read_key(keys::ASSIGNED_TENANT_ID)
            .and_then(|raw| raw.parse::<TenantId>().ok())
            .or_else(|| claims.assigned_tenant_id.clone());

        Session {
            current_tenant_id: self
                .read_key(keys::CURRENT_TENANT_ID)
                .and_then(|raw| raw.parse().ok()),
            remembered_entity_id: self
                .read_key(keys::CURRENT_ENTITY_ID)
                .and_then(|raw| raw.parse().ok()),
            assigned_tenant_id,
            token,
            claims,
            user,
        }
    }

    fn read_key(&self, key: &str) -> Option<String> {
        match self.storage.get(key) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(key, error = %err, "failed to read persisted session key");
                None
            }
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, StorageError> {
        self.state.lock().map_err(|_| StorageError::Poisoned)
    }

    /// Consistent copy of the session, for one navigation decision.
    pub fn snapshot(&self) -> Session {
        self.lock().map(|s| s.session.clone()).unwrap_or_default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock().map(|s| s.session.is_authenticated()).unwrap_or(false)
    }

    pub fn role(&self) -> Role {
        self.lock().map(|s| s.session.role()).unwrap_or(Role::Unknown)
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.lock().ok().and_then(|s| s.session_id)
    }

    /// Current generation, for operations that must not supersede others.
    pub fn generation(&self) -> Generation {
        Generation(self.generation.load(Ordering::SeqCst))
    }

    /// Start a superseding operation; completions of older ones become stale.
    pub fn begin_operation(&self) -> Generation {
        Generation(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.generation() == generation
    }

    /// Install a freshly authenticated session, unless `generation` is stale.
    ///
    /// Returns `Ok(false)` when the completion was discarded.
    pub fn establish(&self, generation: Generation, session: Session) -> Result<bool, StorageError> {
        let mut state = self.lock()?;
        if !self.is_current(generation) {
            return Ok(false);
        }

        self.persist(&session)?;
        state.session = session;
        state.session_id = Some(Uuid::now_v7());
        Ok(true)
    }

    /// Apply `f` to the session and persist it, unless `generation` is stale.
    pub fn update(
        &self,
        generation: Generation,
        f: impl FnOnce(&mut Session),
    ) -> Result<bool, StorageError> {
        self.try_update(generation, |session| {
            f(session);
            Ok::<_, StorageError>(())
        })
    }

    /// Like [`SessionStore::update`], but `f` may refuse the change.
    ///
    /// When `f` fails nothing is persisted and the session keeps its value.
    pub fn try_update<E: From<StorageError>>(
        &self,
        generation: Generation,
        f: impl FnOnce(&mut Session) -> Result<(), E>,
    ) -> Result<bool, E> {
        let mut state = self.lock()?;
        if !self.is_current(generation) {
            return Ok(false);
        }

        let mut next = state.session.clone();
        f(&mut next)?;
        self.persist(&next)?;
        state.session = next;
        Ok(true)
    }

    /// Record the tenant the principal picked.
    ///
    /// `assign` also binds it as the assigned tenant (tenant-scoped roles).
    pub fn set_tenant(&self, tenant_id: TenantId, assign: bool) -> Result<(), StorageError> {
        let generation = self.generation();
        self.update(generation, |session| {
            if assign {
                session.assigned_tenant_id = Some(tenant_id.clone());
            }
            session.current_tenant_id = Some(tenant_id);
        })
        .map(|_| ())
    }

    /// Persist the entity id of an admitted entity-scoped navigation.
    pub fn remember_entity(&self, entity_id: EntityId) -> Result<(), StorageError> {
        let generation = self.generation();
        self.update(generation, |session| {
            session.remembered_entity_id = Some(entity_id);
        })
        .map(|_| ())
    }

    /// Reset to anonymous and erase every persisted key.
    ///
    /// Always completes: the in-memory session is reset first, storage
    /// failures are logged and do not stop the remaining keys from being
    /// erased.
    pub fn clear(&self) {
        match self.state.lock() {
            Ok(mut state) => *state = State::default(),
            Err(poisoned) => *poisoned.into_inner() = State::default(),
        }

        for key in keys::ALL {
            if let Err(err) = self.storage.remove(key) {
                tracing::warn!(key, error = %err, "failed to erase persisted session key");
            }
        }
    }

    /// Write every key in one batch; on failure storage keeps its old values.
    fn persist(&self, session: &Session) -> Result<(), StorageError> {
        let user = session.user.as_ref().map(serde_json::to_string).transpose()?;

        self.storage.put_many(&[
            (keys::AUTH_TOKEN, session.token.as_deref()),
            (keys::USER_DATA, user.as_deref()),
            (
                keys::CURRENT_TENANT_ID,
                session.current_tenant_id.as_ref().map(TenantId::as_str),
            ),
            (
                keys::ASSIGNED_TENANT_ID,
                session.assigned_tenant_id.as_ref().map(TenantId::as_str),
            ),
            (
                keys::CURRENT_ENTITY_ID,
                session.remembered_entity_id.as_ref().map(EntityId::as_str),
            ),
        ])
    }
}

impl RequestCredentials for SessionStore {
    fn bearer_token(&self) -> Option<String> {
        self.lock().ok().and_then(|s| s.session.token.clone())
    }

    fn tenant_id(&self) -> Option<TenantId> {
        self.lock()
            .ok()
            .and_then(|s| s.session.request_tenant_id().cloned())
    }
}
