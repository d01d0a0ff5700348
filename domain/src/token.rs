//! Driver token lifecycle: issuance, verification and lazy expiry.
//!
//! The registry is the only owner of token records. Every mutation rewrites the
//! whole mapping through its [`TokenStore`] so a restarted process reloads the
//! same set of tokens. Expiry is evaluated when a token is used; there is no
//! background sweep.

use crate::error::{persistence_error, Error, PersistenceErrorKind};
use chrono::Utc;
use log::*;
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use service::config::DEFAULT_ROUTE_ID;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

const TOKEN_PREFIX: &str = "tk_";
const TOKEN_RANDOM_LEN: usize = 16;

/// A persisted token binding. Serialized as `{ busId, routeId, expiresAt }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecord {
    pub bus_id: String,
    #[serde(default = "default_route_id")]
    pub route_id: String,
    /// Absolute expiry in milliseconds since the Unix epoch.
    pub expires_at: i64,
}

fn default_route_id() -> String {
    DEFAULT_ROUTE_ID.to_string()
}

impl TokenRecord {
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        self.expires_at <= now_ms
    }
}

/// token string -> record
pub type TokenMap = HashMap<String, TokenRecord>;

/// Durable backing for the token registry.
///
/// Implementations store the full mapping wholesale; partial updates are not
/// part of the contract.
pub trait TokenStore: Send + Sync {
    /// Load the persisted mapping. A store that has never been written yields an empty map.
    fn load(&self) -> Result<TokenMap, Error>;

    /// Replace the persisted mapping with `tokens`.
    fn save(&self, tokens: &TokenMap) -> Result<(), Error>;
}

/// Stores tokens as a pretty-printed JSON object in a single file.
pub struct JsonFileTokenStore {
    path: PathBuf,
}

impl JsonFileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl TokenStore for JsonFileTokenStore {
    fn load(&self) -> Result<TokenMap, Error> {
        if !self.path.exists() {
            return Ok(TokenMap::new());
        }

        let raw = fs::read_to_string(&self.path)
            .map_err(|e| persistence_error(PersistenceErrorKind::Read, e))?;
        // A file containing `null` is treated like a missing one.
        let tokens: Option<TokenMap> = serde_json::from_str(&raw)?;
        Ok(tokens.unwrap_or_default())
    }

    fn save(&self, tokens: &TokenMap) -> Result<(), Error> {
        let json = serde_json::to_string_pretty(tokens)?;
        let staging = self.staging_path();
        fs::write(&staging, json)?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }
}

/// The in-memory mapping plus a counter bumped on every mutation.
struct TokenState {
    map: TokenMap,
    generation: u64,
}

impl TokenState {
    fn mutated(&mut self) -> (u64, TokenMap) {
        self.generation += 1;
        (self.generation, self.map.clone())
    }
}

/// Owns every issued token for the lifetime of the process.
///
/// The store is written outside the map lock, so a slow save never holds up
/// verification of other producers. Saves are serialized by `saved_generation`
/// and a snapshot older than the last one written is skipped.
pub struct TokenRegistry {
    tokens: Mutex<TokenState>,
    saved_generation: Mutex<u64>,
    store: Box<dyn TokenStore>,
    default_ttl: Duration,
}

impl TokenRegistry {
    /// Build the registry from whatever `store` currently holds. A failed load is
    /// logged and the registry starts empty.
    pub fn load(store: impl TokenStore + 'static, default_ttl: Duration) -> Self {
        let tokens = match store.load() {
            Ok(tokens) => {
                info!("Loaded {} driver token(s) from the token store", tokens.len());
                tokens
            }
            Err(e) => {
                error!("Failed loading tokens, starting with an empty registry: {e}");
                TokenMap::new()
            }
        };

        Self {
            tokens: Mutex::new(TokenState {
                map: tokens,
                generation: 0,
            }),
            saved_generation: Mutex::new(0),
            store: Box::new(store),
            default_ttl,
        }
    }

    /// Issue a new token bound to `producer_id`.
    ///
    /// An absent or empty `route_id` binds the default route; an absent `ttl`
    /// uses the registry's default lifetime.
    pub fn issue(&self, producer_id: &str, route_id: Option<&str>, ttl: Option<Duration>) -> String {
        self.issue_at(producer_id, route_id, ttl, now_millis())
    }

    pub fn issue_at(
        &self,
        producer_id: &str,
        route_id: Option<&str>,
        ttl: Option<Duration>,
        now_ms: i64,
    ) -> String {
        let ttl_ms = i64::try_from(ttl.unwrap_or(self.default_ttl).as_millis()).unwrap_or(i64::MAX);
        let record = TokenRecord {
            bus_id: producer_id.to_string(),
            route_id: route_id
                .filter(|r| !r.is_empty())
                .unwrap_or(DEFAULT_ROUTE_ID)
                .to_string(),
            expires_at: now_ms.saturating_add(ttl_ms),
        };

        // Uniqueness is probabilistic (62^16 possibilities) and not re-checked.
        let token = generate_token();

        debug!(
            "Issuing token for {} on {} (expires at {})",
            record.bus_id, record.route_id, record.expires_at
        );
        let snapshot = {
            let mut state = self.lock();
            state.map.insert(token.clone(), record);
            state.mutated()
        };
        self.persist(snapshot);

        token
    }

    /// Returns true when `token` exists, has not expired and, if both the claim and
    /// the binding name a producer, they name the same one.
    ///
    /// An expired token is removed from the registry as a side effect.
    pub fn verify(&self, token: Option<&str>, claimed_producer_id: Option<&str>) -> bool {
        self.verify_at(token, claimed_producer_id, now_millis())
    }

    pub fn verify_at(
        &self,
        token: Option<&str>,
        claimed_producer_id: Option<&str>,
        now_ms: i64,
    ) -> bool {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return false;
        };

        let mut state = self.lock();
        let Some(record) = state.map.get(token) else {
            return false;
        };

        if record.is_expired_at(now_ms) {
            debug!("Token for {} expired at {}, revoking", record.bus_id, record.expires_at);
            state.map.remove(token);
            let snapshot = state.mutated();
            drop(state);
            self.persist(snapshot);
            return false;
        }

        match claimed_producer_id.filter(|id| !id.is_empty()) {
            Some(claimed) if !record.bus_id.is_empty() && record.bus_id != claimed => {
                debug!(
                    "Token bound to {} presented for {}, rejecting",
                    record.bus_id, claimed
                );
                false
            }
            _ => true,
        }
    }

    /// Copy of the current mapping.
    pub fn snapshot(&self) -> TokenMap {
        self.lock().map.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().map.is_empty()
    }

    // Must be called without the map lock held.
    fn persist(&self, (generation, tokens): (u64, TokenMap)) {
        let mut saved = self
            .saved_generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if generation <= *saved {
            trace!("Skipping stale token snapshot {generation}, {} already saved", *saved);
            return;
        }

        match self.store.save(&tokens) {
            Ok(()) => *saved = generation,
            Err(e) => error!("Failed saving tokens, keeping in-memory state: {e}"),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TokenState> {
        self.tokens.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn generate_token() -> String {
    let random: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_RANDOM_LEN)
        .map(char::from)
        .collect();
    format!("{TOKEN_PREFIX}{random}")
}

/// Vehicle id handed out when a token is requested without one: `bus-<0..9999>`.
pub fn generate_vehicle_id() -> String {
    format!("bus-{}", rand::thread_rng().gen_range(0..9999))
}

pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
