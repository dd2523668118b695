//! MongoDB implementation of EventRepository

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use futures_util::TryStreamExt;
use mongodb::bson::{self, Document, doc, oid::ObjectId};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument};
use mongodb::{Collection, Database, IndexModel};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::error::{EventError, Result};
use crate::models::{Event, EventPatch, EventStatus, EventType, NewEvent, PatchedEvent};
use crate::repository::EventRepository;

/// Collection holding one document per event
pub const COLLECTION_NAME: &str = "eventcollection";

/// Stored shape of an event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventDocument {
    #[serde(rename = "_id")]
    id: ObjectId,
    title: String,
    description: String,
    event_type: EventType,
    date: bson::DateTime,
    time: String,
    venue: String,
    max_participants: i32,
    #[serde(default)]
    current_participants: i32,
    #[serde(default)]
    image: String,
    #[serde(default)]
    status: EventStatus,
    created_at: bson::DateTime,
    updated_at: bson::DateTime,
}

impl EventDocument {
    fn new(event: NewEvent) -> Self {
        let now = bson::DateTime::now();
        Self {
            id: ObjectId::new(),
            title: event.title,
            description: event.description,
            event_type: event.event_type,
            date: date_to_bson(event.date),
            time: event.time,
            venue: event.venue,
            max_participants: event.max_participants,
            current_participants: event.current_participants,
            image: event.image,
            status: event.status,
            created_at: now,
            updated_at: now,
        }
    }
}

impl TryFrom<EventDocument> for Event {
    type Error = EventError;

    fn try_from(doc: EventDocument) -> Result<Self> {
        let id = doc.id.to_hex();
        let date = bson_to_utc(doc.date, &id)?.date_naive();

        Ok(Event {
            created_at: bson_to_utc(doc.created_at, &id)?,
            updated_at: bson_to_utc(doc.updated_at, &id)?,
            id,
            title: doc.title,
            description: doc.description,
            event_type: doc.event_type,
            date,
            time: doc.time,
            venue: doc.venue,
            max_participants: doc.max_participants,
            current_participants: doc.current_participants,
            image: doc.image,
            status: doc.status,
        })
    }
}

/// Calendar dates are stored as midnight UTC.
fn date_to_bson(date: NaiveDate) -> bson::DateTime {
    bson::DateTime::from_millis(date.and_time(NaiveTime::MIN).and_utc().timestamp_millis())
}

fn bson_to_utc(value: bson::DateTime, id: &str) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(value.timestamp_millis())
        .ok_or_else(|| EventError::Storage(format!("Event {} has an out-of-range timestamp", id)))
}

/// MongoDB-based event repository
#[derive(Clone)]
pub struct MongoEventRepository {
    database: Database,
    collection: Collection<EventDocument>,
}

impl MongoEventRepository {
    pub fn new(database: &Database) -> Self {
        Self::with_collection(database, COLLECTION_NAME)
    }

    /// Use a custom collection name
    pub fn with_collection(database: &Database, name: &str) -> Self {
        Self {
            database: database.clone(),
            collection: database.collection(name),
        }
    }

    /// Create the text index used by search and the date index used by listing.
    pub async fn create_indexes(&self) -> Result<()> {
        let indexes = vec![
            IndexModel::builder()
                .keys(doc! { "title": "text", "description": "text", "venue": "text" })
                .options(
                    IndexOptions::builder()
                        .name("event_text".to_string())
                        .build(),
                )
                .build(),
            IndexModel::builder().keys(doc! { "date": 1 }).build(),
        ];

        self.collection.create_indexes(indexes).await?;
        info!(collection = %self.collection.name(), "Event indexes ensured");
        Ok(())
    }

    /// `$set` body for the supplied fields of `patch`
    fn set_document(patch: &EventPatch) -> Document {
        let mut set = Document::new();

        if let Some(title) = &patch.title {
            set.insert("title", title);
        }
        if let Some(description) = &patch.description {
            set.insert("description", description);
        }
        if let Some(event_type) = patch.event_type {
            set.insert("eventType", event_type.to_string());
        }
        if let Some(date) = patch.date {
            set.insert("date", date_to_bson(date));
        }
        if let Some(time) = &patch.time {
            set.insert("time", time);
        }
        if let Some(venue) = &patch.venue {
            set.insert("venue", venue);
        }
        if let Some(max) = patch.max_participants {
            set.insert("maxParticipants", max);
        }
        if let Some(current) = patch.current_participants {
            set.insert("currentParticipants", current);
        }
        if let Some(status) = patch.status {
            set.insert("status", status.to_string());
        }
        if let Some(image) = &patch.image {
            set.insert("image", image);
        }

        set
    }

    fn update_document(patch: &EventPatch, updated_at: bson::DateTime) -> Document {
        let mut set = Self::set_document(patch);
        set.insert("updatedAt", updated_at);
        doc! { "$set": set }
    }

    async fn collect(&self, filter: Document, options: FindOptions) -> Result<Vec<Event>> {
        let cursor = self.collection.find(filter).with_options(options).await?;
        let documents: Vec<EventDocument> = cursor.try_collect().await?;
        documents.into_iter().map(Event::try_from).collect()
    }
}

#[async_trait]
impl EventRepository for MongoEventRepository {
    #[instrument(skip(self, event), fields(title = %event.title))]
    async fn insert(&self, event: NewEvent) -> Result<Event> {
        let document = EventDocument::new(event);
        self.collection.insert_one(&document).await?;
        Event::try_from(document)
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: &str) -> Result<Option<Event>> {
        let Ok(oid) = ObjectId::parse_str(id) else {
            return Ok(None);
        };

        self.collection
            .find_one(doc! { "_id": oid })
            .await?
            .map(Event::try_from)
            .transpose()
    }

    #[instrument(skip(self))]
    async fn list_by_date(&self) -> Result<Vec<Event>> {
        let options = FindOptions::builder()
            .sort(doc! { "date": 1, "_id": 1 })
            .build();
        self.collect(doc! {}, options).await
    }

    #[instrument(skip(self))]
    async fn search(&self, query: &str) -> Result<Vec<Event>> {
        let options = FindOptions::builder()
            .projection(doc! { "score": { "$meta": "textScore" } })
            .sort(doc! { "score": { "$meta": "textScore" } })
            .build();
        self.collect(doc! { "$text": { "$search": query } }, options)
            .await
    }

    #[instrument(skip(self, patch))]
    async fn patch(&self, id: &str, patch: EventPatch) -> Result<Option<PatchedEvent>> {
        let Ok(oid) = ObjectId::parse_str(id) else {
            return Ok(None);
        };

        let updated_at = bson::DateTime::now();
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::Before)
            .build();

        let Some(document) = self
            .collection
            .find_one_and_update(doc! { "_id": oid }, Self::update_document(&patch, updated_at))
            .with_options(options)
            .await?
        else {
            return Ok(None);
        };

        let before = Event::try_from(document)?;
        let after = patch.apply_to(before.clone(), bson_to_utc(updated_at, id)?);
        Ok(Some(PatchedEvent { before, after }))
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &str) -> Result<bool> {
        let Ok(oid) = ObjectId::parse_str(id) else {
            return Ok(false);
        };

        let result = self.collection.delete_one(doc! { "_id": oid }).await?;
        Ok(result.deleted_count > 0)
    }

    async fn ping(&self) -> Result<()> {
        self.database.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }
}
