use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::error::{ErrorKind, Severity, StructuredError};

use super::SqliteStore;

/// Transaction lifecycle state. Nested top-level transactions are not
/// supported; nesting happens through savepoints while `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    Idle,
    Active,
}

/// Explicit begin/commit/rollback/savepoint state machine over the store.
///
/// The manager is the only component that issues transaction control
/// statements; read paths and the result cache never touch it.
#[derive(Debug)]
pub struct TransactionManager {
    store: Arc<SqliteStore>,
    state: TxnState,
    savepoints: Vec<String>,
}

impl TransactionManager {
    pub fn new(store: Arc<SqliteStore>) -> Self {
        Self {
            store,
            state: TxnState::Idle,
            savepoints: Vec::new(),
        }
    }

    pub fn state(&self) -> TxnState {
        self.state
    }

    pub fn savepoints(&self) -> &[String] {
        &self.savepoints
    }

    fn misuse(message: &str) -> StructuredError {
        StructuredError::new(ErrorKind::Transaction, message)
            .with_severity(Severity::Low)
            .with_retryable(false)
    }

    // Savepoint names are interpolated into SQL; restrict them to
    // identifier characters.
    fn validate_name(name: &str) -> crate::error::Result<()> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if valid {
            Ok(())
        } else {
            Err(Self::misuse("invalid savepoint name"))
        }
    }

    pub async fn begin(&mut self) -> crate::error::Result<()> {
        if self.state == TxnState::Active {
            return Err(Self::misuse(
                "cannot start a transaction within a transaction",
            ));
        }
        self.store.execute_raw("BEGIN IMMEDIATE")?;
        self.state = TxnState::Active;
        debug!("transaction started");
        Ok(())
    }

    /// Commit the open transaction. If the engine-level commit fails, a
    /// rollback is attempted automatically so the caller never holds an
    /// ambiguous half-committed handle.
    pub async fn commit(&mut self) -> crate::error::Result<()> {
        if self.state == TxnState::Idle {
            return Err(Self::misuse("commit outside of a transaction"));
        }
        match self.store.execute_raw("COMMIT") {
            Ok(()) => {
                self.state = TxnState::Idle;
                self.savepoints.clear();
                debug!("transaction committed");
                Ok(())
            }
            Err(commit_err) => {
                warn!(error = %commit_err, "commit failed, attempting rollback");
                match self.store.execute_raw("ROLLBACK") {
                    Ok(()) => {
                        self.state = TxnState::Idle;
                        self.savepoints.clear();
                        Err(StructuredError::new(
                            ErrorKind::Transaction,
                            format!("commit failed and was rolled back: {}", commit_err.message),
                        )
                        .with_severity(Severity::High)
                        .with_recoverable(true))
                    }
                    Err(rollback_err) => Err(self.fatal_rollback_failure(&rollback_err)),
                }
            }
        }
    }

    /// Roll back the open transaction, returning to `Idle` and clearing the
    /// savepoint stack.
    pub async fn rollback(&mut self) -> crate::error::Result<()> {
        if self.state == TxnState::Idle {
            return Err(Self::misuse("rollback outside of a transaction"));
        }
        match self.store.execute_raw("ROLLBACK") {
            Ok(()) => {
                self.state = TxnState::Idle;
                self.savepoints.clear();
                debug!("transaction rolled back");
                Ok(())
            }
            Err(e) => Err(self.fatal_rollback_failure(&e)),
        }
    }

    /// Push a named savepoint onto the open transaction.
    pub async fn savepoint(&mut self, name: &str) -> crate::error::Result<()> {
        if self.state == TxnState::Idle {
            return Err(Self::misuse("savepoint outside of a transaction"));
        }
        Self::validate_name(name)?;
        self.store.execute_raw(&format!("SAVEPOINT {name}"))?;
        self.savepoints.push(name.to_string());
        Ok(())
    }

    /// Roll back to a named savepoint, popping every savepoint created after
    /// it while keeping the transaction open. An unknown name degrades to a
    /// full rollback.
    pub async fn rollback_to(&mut self, name: &str) -> crate::error::Result<()> {
        if self.state == TxnState::Idle {
            return Err(Self::misuse("rollback outside of a transaction"));
        }
        let Some(pos) = self.savepoints.iter().position(|s| s == name) else {
            warn!(savepoint = name, "unknown savepoint, rolling back fully");
            return self.rollback().await;
        };
        self.store.execute_raw(&format!("ROLLBACK TO {name}"))?;
        self.savepoints.truncate(pos + 1);
        Ok(())
    }

    /// A failed rollback leaves the session unusable: no further mutating
    /// operation may be attempted without reinitializing the store.
    fn fatal_rollback_failure(&mut self, cause: &StructuredError) -> StructuredError {
        error!(error = %cause, "rollback failed, session is unusable");
        self.state = TxnState::Idle;
        self.savepoints.clear();
        StructuredError::new(
            ErrorKind::Transaction,
            format!("rollback failed: {}", cause.message),
        )
        .with_severity(Severity::Critical)
        .with_recoverable(false)
        .with_retryable(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> TransactionManager {
        TransactionManager::new(Arc::new(SqliteStore::in_memory().unwrap()))
    }

    #[tokio::test]
    async fn begin_commit_cycle() {
        let mut txn = manager();
        assert_eq!(txn.state(), TxnState::Idle);
        txn.begin().await.unwrap();
        assert_eq!(txn.state(), TxnState::Active);
        txn.commit().await.unwrap();
        assert_eq!(txn.state(), TxnState::Idle);
    }

    #[tokio::test]
    async fn begin_while_active_is_low_severity_misuse() {
        let mut txn = manager();
        txn.begin().await.unwrap();
        let err = txn.begin().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Transaction);
        assert_eq!(err.severity, Severity::Low);
        assert!(!err.retryable);
        // The original transaction is still usable.
        assert_eq!(txn.state(), TxnState::Active);
        txn.commit().await.unwrap();
    }

    #[tokio::test]
    async fn commit_while_idle_fails() {
        let mut txn = manager();
        txn.begin().await.unwrap();
        txn.commit().await.unwrap();
        let err = txn.commit().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Transaction);
        assert_eq!(err.severity, Severity::Low);
    }

    #[tokio::test]
    async fn rollback_while_idle_fails() {
        let mut txn = manager();
        let err = txn.rollback().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Transaction);
        assert_eq!(err.severity, Severity::Low);
    }

    #[tokio::test]
    async fn savepoint_requires_active_transaction() {
        let mut txn = manager();
        let err = txn.savepoint("sp").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Transaction);
    }

    #[tokio::test]
    async fn rollback_to_pops_later_savepoints_and_stays_active() {
        let mut txn = manager();
        txn.begin().await.unwrap();
        txn.savepoint("a").await.unwrap();
        txn.savepoint("b").await.unwrap();
        txn.rollback_to("a").await.unwrap();
        assert_eq!(txn.savepoints(), ["a"]);
        assert_eq!(txn.state(), TxnState::Active);
        txn.commit().await.unwrap();
    }

    #[tokio::test]
    async fn rollback_to_unknown_savepoint_rolls_back_fully() {
        let mut txn = manager();
        txn.begin().await.unwrap();
        txn.savepoint("a").await.unwrap();
        txn.rollback_to("nope").await.unwrap();
        assert_eq!(txn.state(), TxnState::Idle);
        assert!(txn.savepoints().is_empty());
    }

    #[tokio::test]
    async fn plain_rollback_clears_savepoint_stack() {
        let mut txn = manager();
        txn.begin().await.unwrap();
        txn.savepoint("a").await.unwrap();
        txn.savepoint("b").await.unwrap();
        txn.rollback().await.unwrap();
        assert_eq!(txn.state(), TxnState::Idle);
        assert!(txn.savepoints().is_empty());
    }

    #[tokio::test]
    async fn savepoint_names_are_validated() {
        let mut txn = manager();
        txn.begin().await.unwrap();
        let err = txn.savepoint("a; DROP TABLE posts").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Transaction);
        assert_eq!(err.severity, Severity::Low);
        txn.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn rollback_preserves_pre_transaction_data() {
        use crate::store::PostStore;
        use crate::types::Post;

        fn make_post(id: &str, score: i64) -> Post {
            Post {
                id: id.to_string(),
                title: format!("post {id}"),
                content: None,
                author: None,
                platform: "reddit".to_string(),
                source: "rust".to_string(),
                score,
                num_comments: 0,
                created_at: 1_700_000_000,
                url: String::new(),
            }
        }

        let store = Arc::new(SqliteStore::in_memory().unwrap());
        store.insert_chunk(&[make_post("keep", 1)]).await.unwrap();

        let mut txn = TransactionManager::new(Arc::clone(&store));
        txn.begin().await.unwrap();
        store.insert_chunk(&[make_post("drop", 2)]).await.unwrap();
        txn.rollback().await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_posts, 1);
    }
}
