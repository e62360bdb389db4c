//! Producer identity and liveness.
//!
//! A temp file's name embeds a token identifying the producer that
//! created it: `(pid, per-boot nonce, per-task sequence)`. The Temp
//! Cleaner's liveness oracle is then just "is this token registered in
//! the set of tasks this process currently has in flight" — tokens
//! minted by a previous process instance are never in that set and fall
//! through to the `unknown_files` policy, same as any other file this
//! process doesn't recognize.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashSet;
use lazy_static::lazy_static;

lazy_static! {
    /// Process-wide boot nonce: distinguishes this process instance from a
    /// prior one that happened to reuse the same pid.
    static ref BOOT_NONCE: u64 = {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64
    };

    /// Tokens for producer tasks that are currently in flight, scoped to
    /// this process. This is the liveness oracle the Temp Cleaner queries.
    static ref LIVE_OWNERS: DashSet<String> = DashSet::new();
}

static TASK_SEQ: AtomicU64 = AtomicU64::new(0);

/// Opaque identifier of the producer that created (or is creating) a temp
/// file. Encodes `pid-bootnonce-taskseq` so that a cleaner in *this*
/// process can test liveness with a set lookup, while a token surviving a
/// process restart never matches anything and is treated as garbage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OwnerToken(String);

impl OwnerToken {
    /// Mints a new token scoped to this process. `task_seq` should be
    /// unique per in-flight producer (the caller of `register` picks it,
    /// typically from the same monotonic counter used for unique tokens).
    pub fn for_current_process(task_seq: u64) -> Self {
        OwnerToken(format!("{}-{}-{}", std::process::id(), *BOOT_NONCE, task_seq))
    }

    /// Registers this token as belonging to a live producer. Returns a
    /// guard that deregisters it on drop, so liveness is tied to the
    /// producer's stack frame rather than requiring an explicit "done"
    /// call on every exit path (including panics and cancellation).
    pub fn register(self: &Arc<Self>) -> OwnerGuard {
        LIVE_OWNERS.insert(self.0.clone());
        OwnerGuard(self.clone())
    }

    pub fn next_task_seq() -> u64 {
        TASK_SEQ.fetch_add(1, Ordering::Relaxed)
    }

    /// Is this token registered as a live producer in *this* process? A
    /// token this process never minted (e.g. left behind by a prior
    /// instance, or a different process sharing the directory) always
    /// answers `false`; callers fall back to `unknown_files` policy for
    /// those rather than treating `false` as a synchronous death.
    pub fn is_alive(token: &str) -> bool {
        LIVE_OWNERS.contains(token)
    }
}

impl fmt::Display for OwnerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// RAII membership in the live-owner set. Dropped when the producer's
/// `put`/`execute` call returns, whether it committed, rolled back, was
/// cancelled, or panicked.
pub struct OwnerGuard(Arc<OwnerToken>);

impl Drop for OwnerGuard {
    fn drop(&mut self) {
        LIVE_OWNERS.remove(&self.0.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_token_is_alive_until_dropped() {
        let token = Arc::new(OwnerToken::for_current_process(OwnerToken::next_task_seq()));
        assert!(!OwnerToken::is_alive(&token.to_string()));
        let guard = token.register();
        assert!(OwnerToken::is_alive(&token.to_string()));
        drop(guard);
        assert!(!OwnerToken::is_alive(&token.to_string()));
    }

    #[test]
    fn foreign_token_is_never_alive() {
        assert!(!OwnerToken::is_alive("9999999-123-456"));
    }
}
