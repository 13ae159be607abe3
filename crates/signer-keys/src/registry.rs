//! # Key Registry
//!
//! Holds the master account's signing keys, tracks per-key health, and hands
//! keys out round-robin so concurrent transfers spread across access keys
//! (which keeps per-key submission concurrency at one when there are at
//! least as many keys as parallel workers).
//!
//! Selection policy:
//!
//! 1. keys that are active with fewer than [`PREFERRED_ERROR_CEILING`]
//!    consecutive errors, round-robin;
//! 2. else any active key;
//! 3. else fail with [`RegistryError::NoKeys`].

use crate::{DEACTIVATION_THRESHOLD, PREFERRED_ERROR_CEILING};
use chain_wire::KeyPair;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

/// Registry failures.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// Every key is deactivated.
    #[error("no active signing keys available")]
    NoKeys,
    /// Index out of range for mark/rotate operations.
    #[error("unknown key index {0}")]
    UnknownKey(usize),
}

/// A signing key with its health state.
pub struct ManagedKey {
    key_pair: KeyPair,
    public_key_str: String,
    active: AtomicBool,
    usage_count: AtomicU64,
    consecutive_errors: AtomicU32,
    last_used_at: Mutex<Option<Instant>>,
}

impl ManagedKey {
    fn new(key_pair: KeyPair, active: bool) -> Self {
        let public_key_str = key_pair.public_key_str();
        Self {
            key_pair,
            public_key_str,
            active: AtomicBool::new(active),
            usage_count: AtomicU64::new(0),
            consecutive_errors: AtomicU32::new(0),
            last_used_at: Mutex::new(None),
        }
    }

    /// The signing key material.
    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }

    /// `ed25519:<base58>` public key.
    pub fn public_key_str(&self) -> &str {
        &self.public_key_str
    }

    /// Whether the key may be selected at all.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    /// Current consecutive-error count.
    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors.load(Ordering::Relaxed)
    }

    /// Total successful selections of this key.
    pub fn usage_count(&self) -> u64 {
        self.usage_count.load(Ordering::Relaxed)
    }

    fn is_preferred(&self) -> bool {
        self.is_active() && self.consecutive_errors() < PREFERRED_ERROR_CEILING
    }

    fn touch(&self) {
        self.usage_count.fetch_add(1, Ordering::Relaxed);
        *self.last_used_at.lock() = Some(Instant::now());
    }
}

/// A key handed out for one signing operation.
#[derive(Clone)]
pub struct KeyLease {
    /// The signing account.
    pub account_id: String,
    /// Registry slot of the key; pass back to `mark_success`/`mark_failure`.
    pub index: usize,
    /// The key itself.
    pub key: Arc<ManagedKey>,
}

/// The set of signing keys for one master account.
pub struct KeyRegistry {
    account_id: String,
    keys: RwLock<Vec<Arc<ManagedKey>>>,
    cursor: AtomicUsize,
}

impl KeyRegistry {
    /// Creates a registry. Keys in `pending_activation` start inactive and
    /// only become selectable via [`activate`](Self::activate) once their
    /// on-chain access key has been confirmed.
    pub fn new(account_id: impl Into<String>, keys: Vec<KeyPair>, pending_activation: Vec<KeyPair>) -> Self {
        let mut managed: Vec<Arc<ManagedKey>> = keys
            .into_iter()
            .map(|k| Arc::new(ManagedKey::new(k, true)))
            .collect();
        managed.extend(
            pending_activation
                .into_iter()
                .map(|k| Arc::new(ManagedKey::new(k, false))),
        );
        Self {
            account_id: account_id.into(),
            keys: RwLock::new(managed),
            cursor: AtomicUsize::new(0),
        }
    }

    /// The master account these keys sign for.
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Number of keys, active or not.
    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    /// True when the registry holds no keys at all.
    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }

    /// Number of currently active keys.
    pub fn active_count(&self) -> usize {
        self.keys.read().iter().filter(|k| k.is_active()).count()
    }

    /// Public key strings of every key, for nonce initialization.
    pub fn public_keys(&self) -> Vec<String> {
        self.keys
            .read()
            .iter()
            .map(|k| k.public_key_str().to_owned())
            .collect()
    }

    /// Selects a key for signing.
    ///
    /// `hint` (typically the transfer's index within its batch) pins the
    /// starting slot so a batch spreads evenly across keys; the scan falls
    /// back to round-robin from there.
    pub fn acquire(&self, hint: Option<usize>) -> Result<KeyLease, RegistryError> {
        let keys = self.keys.read();
        if keys.is_empty() {
            return Err(RegistryError::NoKeys);
        }

        let start = match hint {
            Some(h) => h % keys.len(),
            None => self.cursor.fetch_add(1, Ordering::Relaxed) % keys.len(),
        };

        let pick = Self::scan(&keys, start, ManagedKey::is_preferred)
            .or_else(|| Self::scan(&keys, start, ManagedKey::is_active))
            .ok_or(RegistryError::NoKeys)?;

        let key = Arc::clone(&keys[pick]);
        key.touch();
        Ok(KeyLease {
            account_id: self.account_id.clone(),
            index: pick,
            key,
        })
    }

    fn scan(
        keys: &[Arc<ManagedKey>],
        start: usize,
        qualifies: impl Fn(&ManagedKey) -> bool,
    ) -> Option<usize> {
        (0..keys.len())
            .map(|offset| (start + offset) % keys.len())
            .find(|&i| qualifies(&keys[i]))
    }

    /// Records a successful use: the error counter decays by one (floor 0).
    pub fn mark_success(&self, index: usize) -> Result<(), RegistryError> {
        let keys = self.keys.read();
        let key = keys.get(index).ok_or(RegistryError::UnknownKey(index))?;
        let _ = key
            .consecutive_errors
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |e| {
                Some(e.saturating_sub(1))
            });
        Ok(())
    }

    /// Records a failed use; past [`DEACTIVATION_THRESHOLD`] consecutive
    /// errors the key is taken out of rotation.
    pub fn mark_failure(&self, index: usize) -> Result<(), RegistryError> {
        let keys = self.keys.read();
        let key = keys.get(index).ok_or(RegistryError::UnknownKey(index))?;
        let errors = key.consecutive_errors.fetch_add(1, Ordering::Relaxed) + 1;
        if errors > DEACTIVATION_THRESHOLD && key.active.swap(false, Ordering::Relaxed) {
            warn!(
                index,
                public_key = key.public_key_str(),
                consecutive_errors = errors,
                "signing key deactivated after repeated failures"
            );
        }
        Ok(())
    }

    /// Activates a key whose on-chain registration has been confirmed.
    pub fn activate(&self, index: usize) -> Result<(), RegistryError> {
        let keys = self.keys.read();
        let key = keys.get(index).ok_or(RegistryError::UnknownKey(index))?;
        if !key.active.swap(true, Ordering::Relaxed) {
            info!(index, public_key = key.public_key_str(), "signing key activated");
        }
        Ok(())
    }

    /// Deactivates a key without touching its error counters.
    pub fn deactivate(&self, index: usize) -> Result<(), RegistryError> {
        let keys = self.keys.read();
        let key = keys.get(index).ok_or(RegistryError::UnknownKey(index))?;
        key.active.store(false, Ordering::Relaxed);
        Ok(())
    }

    /// Administrative rotation: replaces the key in `index` with a fresh
    /// pair, resetting its health. The new key starts inactive until its
    /// on-chain registration is confirmed.
    pub fn rotate(&self, index: usize, replacement: KeyPair) -> Result<String, RegistryError> {
        let mut keys = self.keys.write();
        let slot = keys.get_mut(index).ok_or(RegistryError::UnknownKey(index))?;
        let new_key = Arc::new(ManagedKey::new(replacement, false));
        let public = new_key.public_key_str().to_owned();
        info!(index, public_key = %public, "signing key rotated");
        *slot = new_key;
        Ok(public)
    }

    /// Health snapshot for the control plane: (index, public key, active,
    /// consecutive errors, usage count).
    pub fn snapshot(&self) -> Vec<(usize, String, bool, u32, u64)> {
        self.keys
            .read()
            .iter()
            .enumerate()
            .map(|(i, k)| {
                (
                    i,
                    k.public_key_str().to_owned(),
                    k.is_active(),
                    k.consecutive_errors(),
                    k.usage_count(),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(active: usize, pending: usize) -> KeyRegistry {
        let keys = (0..active)
            .map(|i| KeyPair::from_seed([i as u8 + 1; 32]))
            .collect();
        let pending = (0..pending)
            .map(|i| KeyPair::from_seed([i as u8 + 100; 32]))
            .collect();
        KeyRegistry::new("gateway.testnet", keys, pending)
    }

    // =========================================================================
    // SELECTION
    // =========================================================================

    #[test]
    fn round_robin_cycles_over_active_keys() {
        let reg = registry(3, 0);
        let picks: Vec<usize> = (0..6).map(|_| reg.acquire(None).unwrap().index).collect();
        assert_eq!(picks, vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn hint_pins_the_starting_slot() {
        let reg = registry(4, 0);
        assert_eq!(reg.acquire(Some(2)).unwrap().index, 2);
        assert_eq!(reg.acquire(Some(6)).unwrap().index, 2);
    }

    #[test]
    fn pending_keys_are_not_selected_until_activated() {
        let reg = registry(1, 1);
        for _ in 0..4 {
            assert_eq!(reg.acquire(None).unwrap().index, 0);
        }
        reg.activate(1).unwrap();
        let picks: Vec<usize> = (0..4).map(|_| reg.acquire(None).unwrap().index).collect();
        assert!(picks.contains(&1));
    }

    #[test]
    fn degraded_keys_lose_preference_but_remain_usable() {
        let reg = registry(2, 0);
        for _ in 0..PREFERRED_ERROR_CEILING {
            reg.mark_failure(0).unwrap();
        }
        // Key 0 is degraded; selection should stick to key 1.
        for _ in 0..4 {
            assert_eq!(reg.acquire(None).unwrap().index, 1);
        }
        // Degrade key 1 too: fall back to any active key.
        for _ in 0..PREFERRED_ERROR_CEILING {
            reg.mark_failure(1).unwrap();
        }
        assert!(reg.acquire(None).is_ok());
    }

    #[test]
    fn no_keys_when_everything_deactivated() {
        let reg = registry(1, 0);
        reg.deactivate(0).unwrap();
        assert!(matches!(reg.acquire(None), Err(RegistryError::NoKeys)));
    }

    // =========================================================================
    // HEALTH ACCOUNTING
    // =========================================================================

    #[test]
    fn failures_past_threshold_deactivate() {
        let reg = registry(2, 0);
        for _ in 0..=DEACTIVATION_THRESHOLD {
            reg.mark_failure(0).unwrap();
        }
        let snapshot = reg.snapshot();
        assert!(!snapshot[0].2, "key 0 should be inactive");
        assert_eq!(reg.active_count(), 1);
    }

    #[test]
    fn success_decays_the_error_counter_to_floor_zero() {
        let reg = registry(1, 0);
        reg.mark_failure(0).unwrap();
        reg.mark_failure(0).unwrap();
        reg.mark_success(0).unwrap();
        let snapshot = reg.snapshot();
        assert_eq!(snapshot[0].3, 1);
        reg.mark_success(0).unwrap();
        reg.mark_success(0).unwrap();
        assert_eq!(reg.snapshot()[0].3, 0);
    }

    #[test]
    fn rotation_installs_an_inactive_replacement() {
        let reg = registry(2, 0);
        let before = reg.snapshot()[1].1.clone();
        for _ in 0..3 {
            reg.mark_failure(1).unwrap();
        }
        let after = reg.rotate(1, KeyPair::from_seed([200u8; 32])).unwrap();
        assert_ne!(before, after);
        let snapshot = reg.snapshot();
        assert!(!snapshot[1].2, "rotated key starts inactive");
        assert_eq!(snapshot[1].3, 0, "rotation resets error count");
    }

    #[test]
    fn unknown_index_is_rejected() {
        let reg = registry(1, 0);
        assert!(matches!(reg.mark_success(9), Err(RegistryError::UnknownKey(9))));
        assert!(matches!(reg.mark_failure(9), Err(RegistryError::UnknownKey(9))));
    }

    #[test]
    fn usage_count_tracks_acquisitions() {
        let reg = registry(1, 0);
        reg.acquire(None).unwrap();
        reg.acquire(None).unwrap();
        assert_eq!(reg.snapshot()[0].4, 2);
    }
}
