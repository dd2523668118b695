//! Event domain models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Kind of college activity
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
pub enum EventType {
    Academic,
    Cultural,
    Sports,
    Technical,
    Other,
}

/// Lifecycle status. Only ever changed by an explicit update.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EventStatus {
    #[default]
    Upcoming,
    Ongoing,
    Completed,
}

/// A scheduled college event as returned by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// 24-character hex ObjectId assigned by the database
    #[serde(rename = "_id")]
    #[schema(example = "665f1c2e8b3e4a0012345678")]
    pub id: String,
    pub title: String,
    pub description: String,
    pub event_type: EventType,
    #[schema(value_type = String, format = Date, example = "2025-03-14")]
    pub date: NaiveDate,
    /// Free-form time of day, e.g. "10:00 AM"
    pub time: String,
    pub venue: String,
    pub max_participants: i32,
    pub current_participants: i32,
    /// Relative path of the stored image under the uploads prefix, or empty
    #[schema(example = "/uploads/0190f5a4-7c1e-7d3a-9b2f-3c4d5e6f7a8b.png")]
    pub image: String,
    pub status: EventStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated input for creating an event
#[derive(Debug, Clone, PartialEq, Validate)]
pub struct CreateEvent {
    #[validate(length(min = 1, message = "title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "description is required"))]
    pub description: String,
    pub event_type: EventType,
    pub date: NaiveDate,
    #[validate(length(min = 1, message = "time is required"))]
    pub time: String,
    #[validate(length(min = 1, message = "venue is required"))]
    pub venue: String,
    #[validate(range(min = 1, message = "maxParticipants must be at least 1"))]
    pub max_participants: i32,
    #[validate(range(min = 0, message = "currentParticipants cannot be negative"))]
    pub current_participants: Option<i32>,
    pub status: Option<EventStatus>,
}

impl CreateEvent {
    /// Record to insert, with defaults applied and `image` attached.
    pub fn into_new_event(self, image: String) -> NewEvent {
        NewEvent {
            title: self.title,
            description: self.description,
            event_type: self.event_type,
            date: self.date,
            time: self.time,
            venue: self.venue,
            max_participants: self.max_participants,
            current_participants: self.current_participants.unwrap_or(0),
            image,
            status: self.status.unwrap_or_default(),
        }
    }
}

/// Validated input for a partial update. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Validate)]
pub struct UpdateEvent {
    #[validate(length(min = 1, message = "title cannot be empty"))]
    pub title: Option<String>,
    #[validate(length(min = 1, message = "description cannot be empty"))]
    pub description: Option<String>,
    pub event_type: Option<EventType>,
    pub date: Option<NaiveDate>,
    #[validate(length(min = 1, message = "time cannot be empty"))]
    pub time: Option<String>,
    #[validate(length(min = 1, message = "venue cannot be empty"))]
    pub venue: Option<String>,
    #[validate(range(min = 1, message = "maxParticipants must be at least 1"))]
    pub max_participants: Option<i32>,
    #[validate(range(min = 0, message = "currentParticipants cannot be negative"))]
    pub current_participants: Option<i32>,
    pub status: Option<EventStatus>,
}

/// A fully populated event ready to be persisted
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub event_type: EventType,
    pub date: NaiveDate,
    pub time: String,
    pub venue: String,
    pub max_participants: i32,
    pub current_participants: i32,
    pub image: String,
    pub status: EventStatus,
}

/// Field-level changes applied atomically by the repository
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub event_type: Option<EventType>,
    pub date: Option<NaiveDate>,
    pub time: Option<String>,
    pub venue: Option<String>,
    pub max_participants: Option<i32>,
    pub current_participants: Option<i32>,
    pub status: Option<EventStatus>,
    /// New image path; `None` leaves the stored image untouched
    pub image: Option<String>,
}

impl EventPatch {
    pub fn with_image(mut self, image: String) -> Self {
        self.image = Some(image);
        self
    }

    /// `event` with every supplied field replaced and `updated_at` restamped.
    pub fn apply_to(self, mut event: Event, updated_at: DateTime<Utc>) -> Event {
        if let Some(title) = self.title {
            event.title = title;
        }
        if let Some(description) = self.description {
            event.description = description;
        }
        if let Some(event_type) = self.event_type {
            event.event_type = event_type;
        }
        if let Some(date) = self.date {
            event.date = date;
        }
        if let Some(time) = self.time {
            event.time = time;
        }
        if let Some(venue) = self.venue {
            event.venue = venue;
        }
        if let Some(max) = self.max_participants {
            event.max_participants = max;
        }
        if let Some(current) = self.current_participants {
            event.current_participants = current;
        }
        if let Some(status) = self.status {
            event.status = status;
        }
        if let Some(image) = self.image {
            event.image = image;
        }
        event.updated_at = updated_at;
        event
    }
}

/// A patched event as it was stored immediately before and after the write
#[derive(Debug, Clone, PartialEq)]
pub struct PatchedEvent {
    pub before: Event,
    pub after: Event,
}

impl From<UpdateEvent> for EventPatch {
    fn from(update: UpdateEvent) -> Self {
        Self {
            title: update.title,
            description: update.description,
            event_type: update.event_type,
            date: update.date,
            time: update.time,
            venue: update.venue,
            max_participants: update.max_participants,
            current_participants: update.current_participants,
            status: update.status,
            image: None,
        }
    }
}

/// Query string for `GET /search`
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct SearchQuery {
    /// Text matched against title, description and venue
    pub query: Option<String>,
}

/// Acknowledgement returned by `DELETE /{id}`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeleteResponse {
    #[schema(example = "Event deleted successfully")]
    pub message: String,
}

impl DeleteResponse {
    pub fn deleted() -> Self {
        Self {
            message: "Event deleted successfully".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn sample_create() -> CreateEvent {
        CreateEvent {
            title: "Tech Talk".to_string(),
            description: "Rust in production".to_string(),
            event_type: EventType::Technical,
            date: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
            time: "10:00 AM".to_string(),
            venue: "Hall A".to_string(),
            max_participants: 50,
            current_participants: None,
            status: None,
        }
    }

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(EventType::from_str("Sports").unwrap(), EventType::Sports);
        assert!(EventType::from_str("sports").is_err());
        assert_eq!(EventStatus::from_str("ongoing").unwrap(), EventStatus::Ongoing);
        assert_eq!(EventStatus::Completed.to_string(), "completed");
        assert_eq!(
            serde_json::to_string(&EventType::Cultural).unwrap(),
            "\"Cultural\""
        );
    }

    #[test]
    fn test_create_defaults() {
        let new_event = sample_create().into_new_event(String::new());
        assert_eq!(new_event.current_participants, 0);
        assert_eq!(new_event.status, EventStatus::Upcoming);
        assert_eq!(new_event.image, "");
    }

    #[test]
    fn test_create_overrides_are_kept() {
        let mut create = sample_create();
        create.current_participants = Some(12);
        create.status = Some(EventStatus::Ongoing);

        let new_event = create.into_new_event("/uploads/a.png".to_string());
        assert_eq!(new_event.current_participants, 12);
        assert_eq!(new_event.status, EventStatus::Ongoing);
        assert_eq!(new_event.image, "/uploads/a.png");
    }

    #[test]
    fn test_max_participants_bounds() {
        let mut create = sample_create();
        create.max_participants = 0;
        let errors = create.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("max_participants"));

        create.max_participants = 1;
        assert!(create.validate().is_ok());
    }

    #[test]
    fn test_update_validation_only_checks_supplied_fields() {
        assert!(UpdateEvent::default().validate().is_ok());

        let update = UpdateEvent {
            title: Some(String::new()),
            current_participants: Some(-1),
            ..Default::default()
        };
        let errors = update.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("title"));
        assert!(fields.contains_key("current_participants"));
    }

    #[test]
    fn test_patch_from_update() {
        let patch = EventPatch::from(UpdateEvent {
            title: Some("New".to_string()),
            ..Default::default()
        });
        assert_eq!(patch.title.as_deref(), Some("New"));
        assert!(patch.description.is_none());
        assert!(patch.image.is_none());
    }

    #[test]
    fn test_patch_applies_only_supplied_fields() {
        let created = DateTime::from_timestamp_millis(1_741_910_400_000).unwrap();
        let new = sample_create().into_new_event("/uploads/old.png".to_string());
        let event = Event {
            id: "665f1c2e8b3e4a0012345678".to_string(),
            title: new.title,
            description: new.description,
            event_type: new.event_type,
            date: new.date,
            time: new.time,
            venue: new.venue,
            max_participants: new.max_participants,
            current_participants: new.current_participants,
            image: new.image,
            status: new.status,
            created_at: created,
            updated_at: created,
        };
        let later = DateTime::from_timestamp_millis(1_741_996_800_000).unwrap();

        let patched = EventPatch {
            venue: Some("Hall B".to_string()),
            status: Some(EventStatus::Ongoing),
            ..Default::default()
        }
        .with_image("/uploads/new.png".to_string())
        .apply_to(event.clone(), later);

        assert_eq!(patched.venue, "Hall B");
        assert_eq!(patched.status, EventStatus::Ongoing);
        assert_eq!(patched.image, "/uploads/new.png");
        assert_eq!(patched.title, event.title);
        assert_eq!(patched.max_participants, 50);
        assert_eq!(patched.created_at, created);
        assert_eq!(patched.updated_at, later);
    }

    #[test]
    fn test_event_json_uses_wire_names() {
        let event = Event {
            id: "665f1c2e8b3e4a0012345678".to_string(),
            title: "Tech Talk".to_string(),
            description: "d".to_string(),
            event_type: EventType::Technical,
            date: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
            time: "10:00".to_string(),
            venue: "Hall A".to_string(),
            max_participants: 50,
            current_participants: 0,
            image: String::new(),
            status: EventStatus::Upcoming,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["_id"], "665f1c2e8b3e4a0012345678");
        assert_eq!(json["eventType"], "Technical");
        assert_eq!(json["date"], "2025-03-14");
        assert_eq!(json["maxParticipants"], 50);
        assert_eq!(json["currentParticipants"], 0);
        assert_eq!(json["status"], "upcoming");
        assert!(json.get("createdAt").is_some());
        assert!(json.get("updatedAt").is_some());
    }
}
