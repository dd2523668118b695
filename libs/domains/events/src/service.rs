//! Event service layer

use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::blob::BlobStore;
use crate::error::{EventError, Result};
use crate::form::{EventFields, validate_fields};
use crate::models::{CreateEvent, DeleteResponse, Event, EventPatch, PatchedEvent, UpdateEvent};
use crate::repository::EventRepository;
use crate::upload::{UploadedImage, validate_image};

/// Coordinates the event repository and the image blob store
pub struct EventService<R: EventRepository> {
    repository: R,
    blobs: Arc<dyn BlobStore>,
    max_image_bytes: usize,
}

impl<R: EventRepository> EventService<R> {
    pub fn new(repository: R, blobs: Arc<dyn BlobStore>, max_image_bytes: usize) -> Self {
        Self {
            repository,
            blobs,
            max_image_bytes,
        }
    }

    pub fn max_image_bytes(&self) -> usize {
        self.max_image_bytes
    }

    /// All events, earliest date first
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<Event>> {
        self.repository.list_by_date().await
    }

    /// Events matching `query`, most relevant first
    #[instrument(skip(self))]
    pub async fn search(&self, query: Option<&str>) -> Result<Vec<Event>> {
        let query = query.map(str::trim).unwrap_or_default();
        if query.is_empty() {
            return Err(EventError::InvalidArgument("Search query is required".to_string()));
        }
        self.repository.search(query).await
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> Result<Event> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(EventError::not_found)
    }

    /// Validate and store a new event with its optional image.
    #[instrument(skip(self, fields, image), fields(has_image = image.is_some()))]
    pub async fn create(&self, fields: EventFields, image: Option<UploadedImage>) -> Result<Event> {
        let create = CreateEvent::try_from(fields)?;
        validate_fields(&create)?;

        let image_path = self.store_image(image).await?;
        let new_event = create.into_new_event(image_path.clone().unwrap_or_default());

        match self.repository.insert(new_event).await {
            Ok(event) => {
                info!(event_id = %event.id, "Event created");
                Ok(event)
            }
            Err(e) => {
                self.discard_blob(image_path.as_deref()).await;
                Err(e)
            }
        }
    }

    /// Apply a partial update, replacing the image when a new one is sent.
    ///
    /// The image removed afterwards is the one this write replaced, as
    /// reported by the repository.
    #[instrument(skip(self, fields, image), fields(has_image = image.is_some()))]
    pub async fn update(
        &self,
        id: &str,
        fields: EventFields,
        image: Option<UploadedImage>,
    ) -> Result<Event> {
        self.get(id).await?;

        let update = UpdateEvent::try_from(fields)?;
        validate_fields(&update)?;

        let new_image = self.store_image(image).await?;
        let mut patch = EventPatch::from(update);
        if let Some(path) = &new_image {
            patch = patch.with_image(path.clone());
        }

        match self.repository.patch(id, patch).await {
            Ok(Some(PatchedEvent { before, after })) => {
                if new_image.is_some() {
                    self.discard_blob(Some(before.image.as_str())).await;
                }
                info!(event_id = %after.id, "Event updated");
                Ok(after)
            }
            Ok(None) => {
                self.discard_blob(new_image.as_deref()).await;
                Err(EventError::not_found())
            }
            Err(e) => {
                self.discard_blob(new_image.as_deref()).await;
                Err(e)
            }
        }
    }

    /// Remove an event and, best-effort, its image.
    ///
    /// The record goes first; a failed blob removal leaves an orphan file,
    /// never a record pointing at a missing image.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<DeleteResponse> {
        let existing = self.get(id).await?;

        if !self.repository.delete(id).await? {
            return Err(EventError::not_found());
        }

        self.discard_blob(Some(existing.image.as_str())).await;

        info!(event_id = %id, "Event deleted");
        Ok(DeleteResponse::deleted())
    }

    /// Check the repository is reachable
    pub async fn ping(&self) -> Result<()> {
        self.repository.ping().await
    }

    async fn store_image(&self, image: Option<UploadedImage>) -> Result<Option<String>> {
        let Some(image) = image else {
            return Ok(None);
        };

        let image = validate_image(image, self.max_image_bytes)?;
        let path = self.blobs.put(&image.extension, &image.bytes).await?;
        Ok(Some(path))
    }

    async fn discard_blob(&self, path: Option<&str>) {
        let Some(path) = path.filter(|p| !p.is_empty()) else {
            return;
        };

        match self.blobs.delete(path).await {
            Ok(true) => {}
            Ok(false) => warn!(%path, "Image already missing from blob store"),
            Err(e) => warn!(%path, error = %e, "Failed to remove image"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::{LocalBlobStore, MockBlobStore};
    use crate::models::{EventStatus, EventType, NewEvent};
    use crate::repository::MockEventRepository;
    use crate::upload::{DEFAULT_MAX_IMAGE_BYTES, fixtures};
    use chrono::{NaiveDate, Utc};
    use mockall::Sequence;
    use mockall::predicate::eq;
    use tempfile::TempDir;

    const ID: &str = "665f1c2e8b3e4a0012345678";

    fn fields(pairs: &[(&str, &str)]) -> EventFields {
        let mut fields = EventFields::default();
        for (name, value) in pairs {
            fields.set(name, value.to_string());
        }
        fields
    }

    fn create_fields() -> EventFields {
        fields(&[
            ("title", "Tech Talk"),
            ("description", "Rust in production"),
            ("eventType", "Technical"),
            ("date", "2025-03-14"),
            ("time", "10:00 AM"),
            ("venue", "Hall A"),
            ("maxParticipants", "50"),
        ])
    }

    fn stored(new_event: NewEvent) -> Event {
        Event {
            id: ID.to_string(),
            title: new_event.title,
            description: new_event.description,
            event_type: new_event.event_type,
            date: new_event.date,
            time: new_event.time,
            venue: new_event.venue,
            max_participants: new_event.max_participants,
            current_participants: new_event.current_participants,
            image: new_event.image,
            status: new_event.status,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn existing(image: &str) -> Event {
        stored(NewEvent {
            title: "Tech Talk".to_string(),
            description: "Rust in production".to_string(),
            event_type: EventType::Technical,
            date: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
            time: "10:00 AM".to_string(),
            venue: "Hall A".to_string(),
            max_participants: 50,
            current_participants: 0,
            image: image.to_string(),
            status: EventStatus::Upcoming,
        })
    }

    fn png(name: &str) -> UploadedImage {
        UploadedImage {
            file_name: name.to_string(),
            content_type: Some("image/png".to_string()),
            bytes: fixtures::PNG.to_vec(),
        }
    }

    fn disk_store() -> (TempDir, Arc<LocalBlobStore>) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(LocalBlobStore::new(dir.path(), "/uploads"));
        (dir, store)
    }

    fn files_in(dir: &TempDir) -> usize {
        std::fs::read_dir(dir.path()).unwrap().count()
    }

    fn service(repo: MockEventRepository, blobs: Arc<dyn BlobStore>) -> EventService<MockEventRepository> {
        EventService::new(repo, blobs, DEFAULT_MAX_IMAGE_BYTES)
    }

    #[tokio::test]
    async fn test_create_applies_defaults() {
        let mut repo = MockEventRepository::new();
        repo.expect_insert()
            .withf(|e| e.current_participants == 0 && e.status == EventStatus::Upcoming && e.image.is_empty())
            .times(1)
            .returning(|e| Ok(stored(e)));

        let service = service(repo, Arc::new(MockBlobStore::new()));
        let event = service.create(create_fields(), None).await.unwrap();

        assert_eq!(event.title, "Tech Talk");
        assert_eq!(event.max_participants, 50);
    }

    #[tokio::test]
    async fn test_create_rejects_zero_capacity_before_storage() {
        let mut repo = MockEventRepository::new();
        repo.expect_insert().never();

        let service = service(repo, Arc::new(MockBlobStore::new()));
        let mut input = create_fields();
        input.set("maxParticipants", "0".to_string());

        let err = service.create(input, None).await.unwrap_err();
        assert!(matches!(err, EventError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_stores_image() {
        let (dir, blobs) = disk_store();
        let mut repo = MockEventRepository::new();
        repo.expect_insert().returning(|e| Ok(stored(e)));

        let service = service(repo, blobs.clone());
        let event = service.create(create_fields(), Some(png("poster.png"))).await.unwrap();

        assert!(event.image.starts_with("/uploads/"));
        assert!(blobs.exists(&event.image).await.unwrap());
        assert_eq!(files_in(&dir), 1);
    }

    #[tokio::test]
    async fn test_create_rejects_non_image_without_writing() {
        let (dir, blobs) = disk_store();
        let mut repo = MockEventRepository::new();
        repo.expect_insert().never();

        let service = service(repo, blobs);
        let upload = UploadedImage {
            file_name: "notes.txt".to_string(),
            content_type: Some("text/plain".to_string()),
            bytes: b"hello".to_vec(),
        };

        let err = service.create(create_fields(), Some(upload)).await.unwrap_err();
        assert!(matches!(err, EventError::InvalidUpload(_)));
        assert_eq!(files_in(&dir), 0);
    }

    #[tokio::test]
    async fn test_create_removes_blob_when_insert_fails() {
        let (dir, blobs) = disk_store();
        let mut repo = MockEventRepository::new();
        repo.expect_insert()
            .returning(|_| Err(EventError::StorageUnavailable("no servers".to_string())));

        let service = service(repo, blobs);
        let err = service.create(create_fields(), Some(png("poster.png"))).await.unwrap_err();

        assert!(matches!(err, EventError::StorageUnavailable(_)));
        assert_eq!(files_in(&dir), 0);
    }

    #[tokio::test]
    async fn test_search_requires_query() {
        let mut repo = MockEventRepository::new();
        repo.expect_search().never();
        let service = service(repo, Arc::new(MockBlobStore::new()));

        for query in [None, Some(""), Some("   ")] {
            let err = service.search(query).await.unwrap_err();
            assert!(matches!(err, EventError::InvalidArgument(_)));
        }
    }

    #[tokio::test]
    async fn test_search_trims_query() {
        let mut repo = MockEventRepository::new();
        repo.expect_search()
            .with(eq("Sports"))
            .times(1)
            .returning(|_| Ok(vec![]));
        let service = service(repo, Arc::new(MockBlobStore::new()));

        assert!(service.search(Some("  Sports ")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let mut repo = MockEventRepository::new();
        repo.expect_find_by_id().returning(|_| Ok(None));
        let service = service(repo, Arc::new(MockBlobStore::new()));

        let err = service.get("not-an-id").await.unwrap_err();
        assert!(matches!(err, EventError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_title_only_touches_title() {
        let mut repo = MockEventRepository::new();
        repo.expect_find_by_id()
            .with(eq(ID))
            .returning(|_| Ok(Some(existing("/uploads/old.png"))));
        repo.expect_patch()
            .withf(|id, patch| {
                id == ID
                    && *patch
                        == EventPatch {
                            title: Some("New".to_string()),
                            ..Default::default()
                        }
            })
            .times(1)
            .returning(|_, patch| {
                let before = existing("/uploads/old.png");
                let after = patch.apply_to(before.clone(), Utc::now());
                Ok(Some(PatchedEvent { before, after }))
            });

        let mut blobs = MockBlobStore::new();
        blobs.expect_put().never();
        blobs.expect_delete().never();

        let service = service(repo, Arc::new(blobs));
        let event = service.update(ID, fields(&[("title", "New")]), None).await.unwrap();

        assert_eq!(event.title, "New");
        assert_eq!(event.image, "/uploads/old.png");
    }

    #[tokio::test]
    async fn test_update_missing_event_checked_first() {
        let mut repo = MockEventRepository::new();
        repo.expect_find_by_id().returning(|_| Ok(None));
        repo.expect_patch().never();

        let (dir, blobs) = disk_store();
        let service = service(repo, blobs);
        let err = service
            .update(ID, fields(&[("maxParticipants", "zero")]), Some(png("a.png")))
            .await
            .unwrap_err();

        assert!(matches!(err, EventError::NotFound(_)));
        assert_eq!(files_in(&dir), 0);
    }

    #[tokio::test]
    async fn test_update_replaces_image() {
        let (dir, blobs) = disk_store();
        let old = blobs.put("png", fixtures::PNG).await.unwrap();

        let mut repo = MockEventRepository::new();
        let old_path = old.clone();
        repo.expect_find_by_id()
            .returning(move |_| Ok(Some(existing(&old_path))));
        let old_path = old.clone();
        repo.expect_patch().returning(move |_, patch| {
            let before = existing(&old_path);
            let after = patch.apply_to(before.clone(), Utc::now());
            Ok(Some(PatchedEvent { before, after }))
        });

        let service = service(repo, blobs.clone());
        let event = service
            .update(ID, EventFields::default(), Some(png("new.png")))
            .await
            .unwrap();

        assert_ne!(event.image, old);
        assert!(blobs.exists(&event.image).await.unwrap());
        assert!(!blobs.exists(&old).await.unwrap());
        assert_eq!(files_in(&dir), 1);
    }

    #[tokio::test]
    async fn test_update_removes_image_the_write_replaced() {
        let (dir, blobs) = disk_store();
        let read = blobs.put("png", fixtures::PNG).await.unwrap();
        let replaced = blobs.put("png", fixtures::PNG).await.unwrap();

        // A concurrent update swapped the image between the lookup and the write.
        let mut repo = MockEventRepository::new();
        let read_path = read.clone();
        repo.expect_find_by_id()
            .returning(move |_| Ok(Some(existing(&read_path))));
        let replaced_path = replaced.clone();
        repo.expect_patch().returning(move |_, patch| {
            let before = existing(&replaced_path);
            let after = patch.apply_to(before.clone(), Utc::now());
            Ok(Some(PatchedEvent { before, after }))
        });

        let service = service(repo, blobs.clone());
        let event = service
            .update(ID, EventFields::default(), Some(png("new.png")))
            .await
            .unwrap();

        assert!(blobs.exists(&event.image).await.unwrap());
        assert!(!blobs.exists(&replaced).await.unwrap());
        assert!(blobs.exists(&read).await.unwrap());
        assert_eq!(files_in(&dir), 2);
    }

    #[tokio::test]
    async fn test_update_validation_failure_keeps_old_image() {
        let (dir, blobs) = disk_store();
        let old = blobs.put("png", fixtures::PNG).await.unwrap();

        let mut repo = MockEventRepository::new();
        let old_path = old.clone();
        repo.expect_find_by_id()
            .returning(move |_| Ok(Some(existing(&old_path))));
        repo.expect_patch().never();

        let service = service(repo, blobs.clone());
        let err = service
            .update(ID, fields(&[("maxParticipants", "0")]), Some(png("new.png")))
            .await
            .unwrap_err();

        assert!(matches!(err, EventError::Validation(_)));
        assert!(blobs.exists(&old).await.unwrap());
        assert_eq!(files_in(&dir), 1);
    }

    #[tokio::test]
    async fn test_update_storage_failure_discards_new_image() {
        let (dir, blobs) = disk_store();
        let old = blobs.put("png", fixtures::PNG).await.unwrap();

        let mut repo = MockEventRepository::new();
        let old_path = old.clone();
        repo.expect_find_by_id()
            .returning(move |_| Ok(Some(existing(&old_path))));
        repo.expect_patch()
            .returning(|_, _| Err(EventError::Storage("write conflict".to_string())));

        let service = service(repo, blobs.clone());
        let err = service
            .update(ID, EventFields::default(), Some(png("new.png")))
            .await
            .unwrap_err();

        assert!(matches!(err, EventError::Storage(_)));
        assert!(blobs.exists(&old).await.unwrap());
        assert_eq!(files_in(&dir), 1);
    }

    #[tokio::test]
    async fn test_delete_removes_record_and_blob() {
        let mut repo = MockEventRepository::new();
        repo.expect_find_by_id()
            .returning(|_| Ok(Some(existing("/uploads/a.png"))));
        repo.expect_delete().with(eq(ID)).times(1).returning(|_| Ok(true));

        let mut blobs = MockBlobStore::new();
        blobs
            .expect_delete()
            .with(eq("/uploads/a.png"))
            .times(1)
            .returning(|_| Ok(true));

        let service = service(repo, Arc::new(blobs));
        let response = service.delete(ID).await.unwrap();
        assert_eq!(response.message, "Event deleted successfully");
    }

    #[tokio::test]
    async fn test_delete_removes_record_before_blob() {
        let mut seq = Sequence::new();
        let mut repo = MockEventRepository::new();
        repo.expect_find_by_id()
            .returning(|_| Ok(Some(existing("/uploads/a.png"))));
        repo.expect_delete()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(true));

        let mut blobs = MockBlobStore::new();
        blobs
            .expect_delete()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(true));

        let service = service(repo, Arc::new(blobs));
        assert!(service.delete(ID).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_keeps_image_when_record_delete_fails() {
        let mut repo = MockEventRepository::new();
        repo.expect_find_by_id()
            .returning(|_| Ok(Some(existing("/uploads/a.png"))));
        repo.expect_delete()
            .returning(|_| Err(EventError::StorageUnavailable("no servers".to_string())));

        let mut blobs = MockBlobStore::new();
        blobs.expect_delete().never();

        let service = service(repo, Arc::new(blobs));
        let err = service.delete(ID).await.unwrap_err();
        assert!(matches!(err, EventError::StorageUnavailable(_)));
    }

    #[tokio::test]
    async fn test_delete_raced_away_keeps_image() {
        let mut repo = MockEventRepository::new();
        repo.expect_find_by_id()
            .returning(|_| Ok(Some(existing("/uploads/a.png"))));
        repo.expect_delete().returning(|_| Ok(false));

        let mut blobs = MockBlobStore::new();
        blobs.expect_delete().never();

        let service = service(repo, Arc::new(blobs));
        let err = service.delete(ID).await.unwrap_err();
        assert!(matches!(err, EventError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_survives_blob_failure() {
        let mut repo = MockEventRepository::new();
        repo.expect_find_by_id()
            .returning(|_| Ok(Some(existing("/uploads/a.png"))));
        repo.expect_delete().times(1).returning(|_| Ok(true));

        let mut blobs = MockBlobStore::new();
        blobs
            .expect_delete()
            .returning(|_| Err(std::io::Error::other("permission denied")));

        let service = service(repo, Arc::new(blobs));
        assert!(service.delete(ID).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_without_image_skips_blob_store() {
        let mut repo = MockEventRepository::new();
        repo.expect_find_by_id().returning(|_| Ok(Some(existing(""))));
        repo.expect_delete().returning(|_| Ok(true));

        let mut blobs = MockBlobStore::new();
        blobs.expect_delete().never();

        let service = service(repo, Arc::new(blobs));
        assert!(service.delete(ID).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let mut repo = MockEventRepository::new();
        repo.expect_find_by_id().returning(|_| Ok(None));
        repo.expect_delete().never();

        let service = service(repo, Arc::new(MockBlobStore::new()));
        let err = service.delete(ID).await.unwrap_err();
        assert!(matches!(err, EventError::NotFound(_)));
    }
}
