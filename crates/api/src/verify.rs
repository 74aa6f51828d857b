//! Ephemeral verification-code cache and delivery.
//!
//! The cache is an explicitly owned, time-bounded key-value store: each
//! challenge token maps to a short numeric code that expires after the
//! configured TTL and is consumed on its first successful match. A
//! background sweep evicts expired entries on a fixed period. The cache
//! is injected into request handlers as a capability through the
//! application state, never reached through a process-wide singleton.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

/// Delivery failure reported by a [`CodeSender`].
#[derive(Debug, Error)]
#[error("code delivery failed: {0}")]
pub struct DeliveryError(pub String);

/// Opaque delivery channel for verification codes.
///
/// Provider protocols are out of scope; implementations adapt whatever
/// SMS/email gateway the deployment uses.
#[async_trait]
pub trait CodeSender: Send + Sync {
    /// Delivers a verification code to the given phone number.
    async fn send_code(&self, phone: &str, code: &str) -> Result<(), DeliveryError>;
}

/// Default sender that logs the code instead of calling a provider.
pub struct TracingCodeSender;

#[async_trait]
impl CodeSender for TracingCodeSender {
    async fn send_code(&self, phone: &str, code: &str) -> Result<(), DeliveryError> {
        tracing::info!(%phone, %code, "verification code issued");
        Ok(())
    }
}

struct Entry {
    code: String,
    expires_at: Instant,
}

/// Time-bounded store for outstanding verification challenges.
#[derive(Clone)]
pub struct VerificationCache {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    ttl: Duration,
}

impl VerificationCache {
    /// Creates an empty cache whose entries expire after `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// The configured entry lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issues a fresh challenge, returning its token and code.
    ///
    /// The token is a v4 UUID; the six-digit code is derived from a
    /// second UUID's random bytes.
    pub async fn issue(&self) -> (String, String) {
        let token = Uuid::new_v4().to_string();
        let bytes = Uuid::new_v4().into_bytes();
        let raw = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let code = format!("{:06}", raw % 1_000_000);

        let mut entries = self.entries.write().await;
        entries.insert(
            token.clone(),
            Entry {
                code: code.clone(),
                expires_at: Instant::now() + self.ttl,
            },
        );
        (token, code)
    }

    /// Checks a submitted code against the challenge token.
    ///
    /// A successful match consumes the entry; an expired or unknown
    /// token fails. A wrong code leaves the entry in place so the
    /// caller may retry until the TTL runs out.
    pub async fn verify(&self, token: &str, code: &str) -> bool {
        let mut entries = self.entries.write().await;
        match entries.get(token) {
            Some(entry) if entry.expires_at <= Instant::now() => {
                entries.remove(token);
                false
            }
            Some(entry) if entry.code == code => {
                entries.remove(token);
                true
            }
            _ => false,
        }
    }

    /// Evicts expired entries; returns how many were dropped.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    /// Number of outstanding challenges.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Spawns the background eviction sweep on a fixed period.
    pub fn spawn_sweeper(&self, period: Duration) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let evicted = cache.sweep().await;
                if evicted > 0 {
                    tracing::debug!(evicted, "verification cache sweep");
                }
            }
        })
    }
}
