//! Event repository trait

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Event, EventPatch, NewEvent, PatchedEvent};

/// Persistence for events.
///
/// Ids are the database's own 24-hex identifiers. A string that is not a
/// well-formed id behaves like an id that does not exist.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Insert a new event, stamping both timestamps.
    async fn insert(&self, event: NewEvent) -> Result<Event>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Event>>;

    /// All events, earliest date first
    async fn list_by_date(&self) -> Result<Vec<Event>>;

    /// Full-text search over title, description and venue, best match first
    async fn search(&self, query: &str) -> Result<Vec<Event>>;

    /// Apply `patch` atomically and refresh `updatedAt`.
    ///
    /// Returns the event as this write found it and as it left it, or `None`
    /// when no event has this id.
    async fn patch(&self, id: &str, patch: EventPatch) -> Result<Option<PatchedEvent>>;

    /// Remove an event. `false` when no event has this id.
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Round-trip to the backing store.
    async fn ping(&self) -> Result<()>;
}
