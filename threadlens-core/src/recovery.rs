use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{ErrorKind, StructuredError};
use crate::query::ResultCache;
use crate::store::SqliteStore;

/// A named, idempotent remediation step. Actions are side-effecting; the
/// engine does not inspect why an action succeeded, only whether it reports
/// success.
#[async_trait::async_trait]
pub trait RecoveryAction: Send + Sync {
    fn name(&self) -> &'static str;

    /// Attempt the remediation. Returns whether it succeeded.
    async fn attempt(&self) -> bool;
}

/// Ordered recovery plan for one error kind.
pub struct RecoveryStrategy {
    pub actions: Vec<Box<dyn RecoveryAction>>,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl std::fmt::Debug for RecoveryStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryStrategy")
            .field(
                "actions",
                &self.actions.iter().map(|a| a.name()).collect::<Vec<_>>(),
            )
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .finish()
    }
}

/// Immutable kind → strategy table, built once at startup and consulted,
/// never mutated, during recovery attempts.
#[derive(Debug, Default)]
pub struct RecoveryRegistry {
    strategies: HashMap<ErrorKind, RecoveryStrategy>,
}

impl RecoveryRegistry {
    pub fn new(strategies: HashMap<ErrorKind, RecoveryStrategy>) -> Self {
        Self { strategies }
    }

    /// The standard strategy table over a live store and result cache.
    /// Corruption and Permission carry no strategy: they are not recoverable
    /// by design.
    pub fn standard<T>(
        store: Arc<SqliteStore>,
        cache: Arc<ResultCache<T>>,
        max_retries: u32,
        retry_delay: Duration,
    ) -> Self
    where
        T: Clone + Send + Sync + 'static,
    {
        let mut strategies: HashMap<ErrorKind, RecoveryStrategy> = HashMap::new();

        let clear_cache = || -> Box<dyn RecoveryAction> {
            Box::new(ClearResultCache {
                cache: Arc::clone(&cache),
            })
        };
        let integrity_check = || -> Box<dyn RecoveryAction> {
            Box::new(IntegrityCheck {
                store: Arc::clone(&store),
            })
        };

        strategies.insert(
            ErrorKind::Initialization,
            RecoveryStrategy {
                actions: vec![integrity_check()],
                max_retries,
                retry_delay,
            },
        );
        strategies.insert(
            ErrorKind::Connection,
            RecoveryStrategy {
                actions: vec![integrity_check()],
                max_retries,
                retry_delay,
            },
        );
        strategies.insert(
            ErrorKind::Loading,
            RecoveryStrategy {
                actions: vec![clear_cache()],
                max_retries,
                retry_delay,
            },
        );
        strategies.insert(
            ErrorKind::Query,
            RecoveryStrategy {
                actions: vec![clear_cache(), integrity_check()],
                max_retries,
                retry_delay,
            },
        );
        strategies.insert(
            ErrorKind::Transaction,
            RecoveryStrategy {
                actions: vec![Box::new(RollbackOpenTransaction {
                    store: Arc::clone(&store),
                })],
                max_retries,
                retry_delay,
            },
        );
        strategies.insert(
            ErrorKind::Memory,
            RecoveryStrategy {
                actions: vec![clear_cache()],
                max_retries,
                retry_delay,
            },
        );

        Self { strategies }
    }

    pub fn strategy(&self, kind: ErrorKind) -> Option<&RecoveryStrategy> {
        self.strategies.get(&kind)
    }

    /// Attempt recovery for a classified error. Iterates the strategy's
    /// actions in order; the first action that reports success halts the
    /// sequence. No strategy for the kind, or a Critical error, means no
    /// recovery is attempted.
    pub async fn attempt_recovery(&self, err: &StructuredError) -> bool {
        if err.is_critical() {
            warn!(kind = %err.kind, "critical error, recovery suppressed");
            return false;
        }
        let Some(strategy) = self.strategies.get(&err.kind) else {
            debug!(kind = %err.kind, "no recovery strategy");
            return false;
        };
        for action in &strategy.actions {
            debug!(kind = %err.kind, action = action.name(), "attempting recovery action");
            if action.attempt().await {
                info!(kind = %err.kind, action = action.name(), "recovery succeeded");
                return true;
            }
        }
        warn!(kind = %err.kind, "all recovery actions exhausted");
        false
    }

    /// Retry [`attempt_recovery`](Self::attempt_recovery) up to the
    /// strategy's `max_retries`, sleeping `retry_delay` between rounds.
    /// Non-retryable errors get a single attempt.
    pub async fn attempt_recovery_with_retries(&self, err: &StructuredError) -> bool {
        let (max_retries, delay) = self
            .strategy(err.kind)
            .map_or((0, Duration::ZERO), |s| (s.max_retries, s.retry_delay));
        let rounds = if err.retryable { max_retries.max(1) } else { 1 };

        for round in 0..rounds {
            if self.attempt_recovery(err).await {
                return true;
            }
            if round + 1 < rounds {
                tokio::time::sleep(delay).await;
            }
        }
        false
    }
}

// ── Standard actions ───────────────────────────────────────────────

/// Drop every memoized query result.
struct ClearResultCache<T> {
    cache: Arc<ResultCache<T>>,
}

#[async_trait::async_trait]
impl<T: Clone + Send + Sync + 'static> RecoveryAction for ClearResultCache<T> {
    fn name(&self) -> &'static str {
        "clear_result_cache"
    }

    async fn attempt(&self) -> bool {
        self.cache.clear();
        true
    }
}

/// Ask the engine whether its pages are intact.
struct IntegrityCheck {
    store: Arc<SqliteStore>,
}

#[async_trait::async_trait]
impl RecoveryAction for IntegrityCheck {
    fn name(&self) -> &'static str {
        "integrity_check"
    }

    async fn attempt(&self) -> bool {
        self.store.execute_raw("PRAGMA quick_check").is_ok()
    }
}

/// Best-effort rollback of whatever transaction the engine has open.
struct RollbackOpenTransaction {
    store: Arc<SqliteStore>,
}

#[async_trait::async_trait]
impl RecoveryAction for RollbackOpenTransaction {
    fn name(&self) -> &'static str {
        "rollback_open_transaction"
    }

    async fn attempt(&self) -> bool {
        self.store.execute_raw("ROLLBACK").is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Severity;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingAction {
        calls: Arc<AtomicU32>,
        succeed: bool,
    }

    #[async_trait::async_trait]
    impl RecoveryAction for CountingAction {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn attempt(&self) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.succeed
        }
    }

    fn registry_with(actions: Vec<Box<dyn RecoveryAction>>) -> RecoveryRegistry {
        let mut strategies = HashMap::new();
        strategies.insert(
            ErrorKind::Query,
            RecoveryStrategy {
                actions,
                max_retries: 3,
                retry_delay: Duration::from_millis(1),
            },
        );
        RecoveryRegistry::new(strategies)
    }

    #[tokio::test]
    async fn first_successful_action_halts_the_sequence() {
        let first = Arc::new(AtomicU32::new(0));
        let second = Arc::new(AtomicU32::new(0));
        let registry = registry_with(vec![
            Box::new(CountingAction {
                calls: Arc::clone(&first),
                succeed: true,
            }),
            Box::new(CountingAction {
                calls: Arc::clone(&second),
                succeed: true,
            }),
        ]);

        let err = StructuredError::new(ErrorKind::Query, "boom");
        assert!(registry.attempt_recovery(&err).await);
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn exhausted_actions_report_failure() {
        let calls = Arc::new(AtomicU32::new(0));
        let registry = registry_with(vec![
            Box::new(CountingAction {
                calls: Arc::clone(&calls),
                succeed: false,
            }),
            Box::new(CountingAction {
                calls: Arc::clone(&calls),
                succeed: false,
            }),
        ]);

        let err = StructuredError::new(ErrorKind::Query, "boom");
        assert!(!registry.attempt_recovery(&err).await);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn missing_strategy_is_not_recoverable() {
        let registry = registry_with(vec![]);
        let err = StructuredError::new(ErrorKind::Timeout, "slow");
        assert!(!registry.attempt_recovery(&err).await);
    }

    #[tokio::test]
    async fn critical_errors_are_never_auto_recovered() {
        let calls = Arc::new(AtomicU32::new(0));
        let registry = registry_with(vec![Box::new(CountingAction {
            calls: Arc::clone(&calls),
            succeed: true,
        })]);

        let err = StructuredError::new(ErrorKind::Query, "boom").with_severity(Severity::Critical);
        assert!(!registry.attempt_recovery(&err).await);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn retryable_errors_retry_up_to_the_bound() {
        let calls = Arc::new(AtomicU32::new(0));
        let registry = registry_with(vec![Box::new(CountingAction {
            calls: Arc::clone(&calls),
            succeed: false,
        })]);

        let err = StructuredError::new(ErrorKind::Query, "boom");
        assert!(err.retryable);
        assert!(!registry.attempt_recovery_with_retries(&err).await);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn standard_registry_covers_recoverable_kinds() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let cache: Arc<ResultCache<u32>> = Arc::new(ResultCache::new(4));
        let registry =
            RecoveryRegistry::standard(store, cache, 3, Duration::from_millis(10));

        for kind in [
            ErrorKind::Initialization,
            ErrorKind::Connection,
            ErrorKind::Loading,
            ErrorKind::Query,
            ErrorKind::Transaction,
            ErrorKind::Memory,
        ] {
            assert!(registry.strategy(kind).is_some(), "{kind} needs a strategy");
        }
        for kind in [ErrorKind::Corruption, ErrorKind::Permission, ErrorKind::Unknown] {
            assert!(registry.strategy(kind).is_none(), "{kind} must not recover");
        }
    }

    #[tokio::test]
    async fn standard_query_recovery_clears_the_cache() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let cache: Arc<ResultCache<u32>> = Arc::new(ResultCache::new(4));
        cache.insert("k", 1);

        let registry = RecoveryRegistry::standard(
            Arc::clone(&store),
            Arc::clone(&cache),
            3,
            Duration::from_millis(10),
        );
        let err = StructuredError::new(ErrorKind::Query, "no such column: scor");
        assert!(registry.attempt_recovery(&err).await);
        assert!(cache.is_empty());
    }
}
