//! Persistence contract for the task document.
//!
//! Implementations never surface errors to callers: a failed read yields an
//! empty collection and a failed write yields `false`, with the cause logged.
//! Callers therefore cannot tell "empty" from "read failed".

use async_trait::async_trait;

use crate::db::Database;

/// Whole-document load/save of the task collection. Last writer wins.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Read the full collection. Empty on any failure or when no document exists.
    async fn load(&self) -> Database;

    /// Overwrite the full collection, creating the document if needed.
    async fn save(&self, db: &Database) -> bool;
}
