//! Session issuance and resolution.
//!
//! The store maps an opaque, gateway-generated key to the Trust Engine's
//! session token and the trust level it granted. The `sessionKey` cookie
//! only carries that key.

use std::sync::Arc;
use std::time::Duration;

use axum::http::header::COOKIE;
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::debug;
use trust_engine_client::{LoginGrant, TrustLevel};

/// Name of the cookie carrying the session key.
pub const SESSION_COOKIE: &str = "sessionKey";

pub const DEFAULT_SESSION_LIFETIME_MINUTES: i64 = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub token: String,
    pub trust_level: TrustLevel,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Live up to and including `expires_at`.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now <= self.expires_at
    }
}

/// Shared session storage. Implementations must tolerate concurrent access
/// from every request task.
pub trait SessionStore: Send + Sync {
    /// Live record for `key`. Expired records are treated as absent.
    fn get(&self, key: &str, now: DateTime<Utc>) -> Option<SessionRecord>;

    fn put(&self, key: String, record: SessionRecord);

    /// Remove `key`; returns whether it was present.
    fn expire(&self, key: &str) -> bool;

    /// Drop every record expired at `now`; returns how many were removed.
    fn purge_expired(&self, now: DateTime<Utc>) -> usize;
}

#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    records: DashMap<String, SessionRecord>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, key: &str, now: DateTime<Utc>) -> Option<SessionRecord> {
        // Clone out before any removal: holding a shard guard across
        // `remove_if` on the same key deadlocks.
        let record = self.records.get(key).map(|r| r.value().clone())?;
        if record.is_live(now) {
            return Some(record);
        }
        self.records.remove_if(key, |_, r| !r.is_live(now));
        None
    }

    fn put(&self, key: String, record: SessionRecord) {
        self.records.insert(key, record);
    }

    fn expire(&self, key: &str) -> bool {
        self.records.remove(key).is_some()
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut removed = 0;
        self.records.retain(|_, record| {
            let live = record.is_live(now);
            if !live {
                removed += 1;
            }
            live
        });
        removed
    }
}

/// A freshly stored session and the `Set-Cookie` value announcing it.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub key: String,
    pub record: SessionRecord,
    pub cookie: String,
}

pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    lifetime: chrono::Duration,
    secure_cookie: bool,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, lifetime: chrono::Duration) -> Self {
        Self {
            store,
            lifetime,
            secure_cookie: false,
        }
    }

    /// Mark issued cookies `Secure`.
    pub fn with_secure_cookie(mut self, secure: bool) -> Self {
        self.secure_cookie = secure;
        self
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn lifetime(&self) -> chrono::Duration {
        self.lifetime
    }

    /// Store a login grant under a new random key. An expiry beyond the
    /// representable range saturates.
    pub fn issue(&self, grant: LoginGrant, now: DateTime<Utc>) -> IssuedSession {
        let key = uuid::Uuid::new_v4().simple().to_string();
        let record = SessionRecord {
            token: grant.session,
            trust_level: grant.trust_level,
            expires_at: now
                .checked_add_signed(self.lifetime)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        };
        self.store.put(key.clone(), record.clone());
        debug!(expires_at = %record.expires_at, "session issued");

        let cookie = self.cookie(&key, self.lifetime.num_seconds());
        IssuedSession { key, record, cookie }
    }

    /// Resolve the session named by the request's `sessionKey` cookie.
    pub fn resolve(&self, headers: &HeaderMap, now: DateTime<Utc>) -> Option<SessionRecord> {
        let key = session_key(headers)?;
        self.store.get(&key, now)
    }

    /// Drop the session named by the request's cookie, returning a
    /// `Set-Cookie` value that clears it on the client.
    pub fn revoke(&self, headers: &HeaderMap) -> Option<String> {
        let key = session_key(headers)?;
        if self.store.expire(&key) {
            debug!("session revoked");
        }
        Some(self.cookie("", 0))
    }

    fn cookie(&self, value: &str, max_age_secs: i64) -> String {
        let mut cookie = format!(
            "{SESSION_COOKIE}={value}; Path=/; Max-Age={max_age_secs}; HttpOnly; SameSite=Lax"
        );
        if self.secure_cookie {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

/// Value of the `sessionKey` cookie, if the request carries a non-empty one.
pub fn session_key(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// Periodically purge expired sessions so abandoned ones do not accumulate.
/// Intervals below one second are raised to one second.
pub fn spawn_sweeper(store: Arc<dyn SessionStore>, every: Duration) -> JoinHandle<()> {
    let every = every.max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let removed = store.purge_expired(Utc::now());
            if removed > 0 {
                debug!(removed, "purged expired sessions");
            }
        }
    })
}
