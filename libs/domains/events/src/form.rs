//! Multipart form parsing
//!
//! Text parts are captured as-is into [`EventFields`]; conversion into the
//! typed [`CreateEvent`] / [`UpdateEvent`] reports every unparsable field at
//! once, keyed by its JSON name.

use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use chrono::{DateTime, NaiveDate};
use std::borrow::Cow;
use std::str::FromStr;
use utoipa::ToSchema;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::{EventError, Result};
use crate::models::{CreateEvent, EventStatus, EventType, UpdateEvent};
use crate::upload::UploadedImage;

/// Raw text fields of an event form
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventFields {
    pub title: Option<String>,
    pub description: Option<String>,
    pub event_type: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub venue: Option<String>,
    pub max_participants: Option<String>,
    pub current_participants: Option<String>,
    pub status: Option<String>,
}

impl EventFields {
    /// Record a text part. Unknown names are ignored.
    pub fn set(&mut self, name: &str, value: String) {
        let slot = match name {
            "title" => &mut self.title,
            "description" => &mut self.description,
            "eventType" => &mut self.event_type,
            "date" => &mut self.date,
            "time" => &mut self.time,
            "venue" => &mut self.venue,
            "maxParticipants" => &mut self.max_participants,
            "currentParticipants" => &mut self.current_participants,
            "status" => &mut self.status,
            _ => return,
        };
        *slot = Some(value);
    }
}

/// A parsed `multipart/form-data` event submission
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventForm {
    pub fields: EventFields,
    pub image: Option<UploadedImage>,
}

impl EventForm {
    /// Read every part of `multipart`.
    ///
    /// An `image` part without a file name and without content is treated as
    /// "no file chosen".
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| form_error(e, "Malformed form data"))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            if name == "image" {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(|e| {
                    EventError::InvalidUpload(format!("Failed to read image: {}", e.body_text()))
                })?;

                if file_name.is_empty() && bytes.is_empty() {
                    continue;
                }
                form.image = Some(UploadedImage {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| form_error(e, &format!("Failed to read field {}", name)))?;
                form.fields.set(&name, value);
            }
        }

        Ok(form)
    }
}

/// A body over the size limit is an upload problem; anything else is a
/// malformed form.
fn form_error(err: MultipartError, context: &str) -> EventError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return EventError::InvalidUpload(format!(
            "Upload exceeds the maximum request size: {}",
            err.body_text()
        ));
    }
    EventError::InvalidArgument(format!("{}: {}", context, err.body_text()))
}

/// Documentation shape of the multipart body
#[derive(ToSchema)]
#[schema(rename_all = "camelCase")]
#[allow(dead_code)]
pub struct EventUpload {
    title: String,
    description: String,
    #[schema(value_type = EventType)]
    event_type: String,
    /// `YYYY-MM-DD` or an RFC 3339 timestamp
    #[schema(example = "2025-03-14")]
    date: String,
    #[schema(example = "10:00 AM")]
    time: String,
    venue: String,
    #[schema(minimum = 1)]
    max_participants: i32,
    #[schema(minimum = 0)]
    current_participants: Option<i32>,
    #[schema(value_type = Option<EventStatus>)]
    status: Option<String>,
    /// JPEG, PNG or GIF, at most 5 MiB
    #[schema(value_type = Option<String>, format = Binary)]
    image: Option<Vec<u8>>,
}

/// Collects parse failures keyed by JSON field name.
#[derive(Default)]
struct FieldErrors(ValidationErrors);

impl FieldErrors {
    fn push(&mut self, field: &'static str, code: &'static str, message: String) {
        self.0
            .add(field, ValidationError::new(code).with_message(Cow::Owned(message)));
    }

    fn required(&mut self, field: &'static str, value: Option<String>) -> Option<String> {
        let value = value.filter(|v| !v.trim().is_empty());
        if value.is_none() {
            self.push(field, "required", format!("{field} is required"));
        }
        value
    }

    /// A supplied text value must not be blank; absent stays absent.
    fn non_blank(&mut self, field: &'static str, value: Option<String>) -> Option<String> {
        let value = value?;
        if value.trim().is_empty() {
            self.push(field, "blank", format!("{field} cannot be empty"));
            return None;
        }
        Some(value)
    }

    fn parse<T: FromStr>(&mut self, field: &'static str, value: Option<String>, expected: &str) -> Option<T> {
        let value = value.filter(|v| !v.trim().is_empty())?;
        match value.trim().parse() {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                self.push(field, "invalid", format!("{field} must be {expected}"));
                None
            }
        }
    }

    fn date(&mut self, value: Option<String>) -> Option<NaiveDate> {
        let value = value.filter(|v| !v.trim().is_empty())?;
        match parse_date(value.trim()) {
            Some(date) => Some(date),
            None => {
                self.push("date", "invalid", "date must be YYYY-MM-DD or an RFC 3339 timestamp".to_string());
                None
            }
        }
    }

    fn finish(self) -> std::result::Result<(), ValidationErrors> {
        if self.0.is_empty() { Ok(()) } else { Err(self.0) }
    }
}

const EVENT_TYPES: &str = "one of Academic, Cultural, Sports, Technical, Other";
const STATUSES: &str = "one of upcoming, ongoing, completed";

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(value).ok().map(|dt| dt.date_naive()))
}

impl TryFrom<EventFields> for CreateEvent {
    type Error = EventError;

    fn try_from(fields: EventFields) -> Result<Self> {
        let mut errors = FieldErrors::default();

        let title = errors.required("title", fields.title);
        let description = errors.required("description", fields.description);
        let time = errors.required("time", fields.time);
        let venue = errors.required("venue", fields.venue);

        let event_type = errors
            .required("eventType", fields.event_type.clone())
            .and_then(|_| errors.parse::<EventType>("eventType", fields.event_type, EVENT_TYPES));
        let date = errors
            .required("date", fields.date.clone())
            .and_then(|_| errors.date(fields.date));
        let max_participants = errors
            .required("maxParticipants", fields.max_participants.clone())
            .and_then(|_| errors.parse::<i32>("maxParticipants", fields.max_participants, "an integer"));

        let current_participants =
            errors.parse::<i32>("currentParticipants", fields.current_participants, "an integer");
        let status = errors.parse::<EventStatus>("status", fields.status, STATUSES);

        errors.finish()?;

        match (title, description, event_type, date, time, venue, max_participants) {
            (
                Some(title),
                Some(description),
                Some(event_type),
                Some(date),
                Some(time),
                Some(venue),
                Some(max_participants),
            ) => Ok(CreateEvent {
                title: title.trim().to_string(),
                description,
                event_type,
                date,
                time,
                venue,
                max_participants,
                current_participants,
                status,
            }),
            _ => Err(EventError::Validation(ValidationErrors::new())),
        }
    }
}

impl TryFrom<EventFields> for UpdateEvent {
    type Error = EventError;

    fn try_from(fields: EventFields) -> Result<Self> {
        let mut errors = FieldErrors::default();

        let update = UpdateEvent {
            title: errors
                .non_blank("title", fields.title)
                .map(|t| t.trim().to_string()),
            description: errors.non_blank("description", fields.description),
            event_type: errors.parse("eventType", fields.event_type, EVENT_TYPES),
            date: errors.date(fields.date),
            time: errors.non_blank("time", fields.time),
            venue: errors.non_blank("venue", fields.venue),
            max_participants: errors.parse("maxParticipants", fields.max_participants, "an integer"),
            current_participants: errors.parse(
                "currentParticipants",
                fields.current_participants,
                "an integer",
            ),
            status: errors.parse("status", fields.status, STATUSES),
        };

        errors.finish()?;
        Ok(update)
    }
}

/// JSON name of a struct field, for error reporting
fn wire_name(field: &str) -> &'static str {
    match field {
        "title" => "title",
        "description" => "description",
        "event_type" => "eventType",
        "date" => "date",
        "time" => "time",
        "venue" => "venue",
        "max_participants" => "maxParticipants",
        "current_participants" => "currentParticipants",
        "status" => "status",
        _ => "__all__",
    }
}

/// Run `#[derive(Validate)]` rules, reporting fields under their JSON names.
pub fn validate_fields<T: Validate>(input: &T) -> Result<()> {
    let Err(errors) = input.validate() else {
        return Ok(());
    };

    let mut renamed = ValidationErrors::new();
    for (field, field_errors) in errors.field_errors() {
        for error in field_errors {
            renamed.add(wire_name(&field), error.clone());
        }
    }
    Err(EventError::Validation(renamed))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_fields() -> EventFields {
        let mut fields = EventFields::default();
        for (name, value) in [
            ("title", "  Tech Talk  "),
            ("description", "Rust in production"),
            ("eventType", "Technical"),
            ("date", "2025-03-14"),
            ("time", "10:00 AM"),
            ("venue", "Hall A"),
            ("maxParticipants", "50"),
        ] {
            fields.set(name, value.to_string());
        }
        fields
    }

    fn error_fields(err: EventError) -> Vec<String> {
        let EventError::Validation(errors) = err else {
            panic!("expected validation error, got {err:?}");
        };
        let mut names: Vec<String> = errors.field_errors().keys().map(|k| k.to_string()).collect();
        names.sort();
        names
    }

    #[test]
    fn test_set_ignores_unknown_parts() {
        let mut fields = EventFields::default();
        fields.set("organizer", "someone".to_string());
        assert_eq!(fields, EventFields::default());
    }

    #[test]
    fn test_create_from_complete_form() {
        let create = CreateEvent::try_from(full_fields()).unwrap();
        assert_eq!(create.title, "Tech Talk");
        assert_eq!(create.event_type, EventType::Technical);
        assert_eq!(create.date, NaiveDate::from_ymd_opt(2025, 3, 14).unwrap());
        assert_eq!(create.max_participants, 50);
        assert_eq!(create.current_participants, None);
        assert_eq!(create.status, None);
    }

    #[test]
    fn test_create_reports_all_missing_fields() {
        let mut fields = full_fields();
        fields.title = None;
        fields.venue = Some("   ".to_string());
        fields.max_participants = None;

        let err = CreateEvent::try_from(fields).unwrap_err();
        assert_eq!(error_fields(err), ["maxParticipants", "title", "venue"]);
    }

    #[test]
    fn test_create_reports_unparsable_values() {
        let mut fields = full_fields();
        fields.set("eventType", "Party".to_string());
        fields.set("maxParticipants", "fifty".to_string());
        fields.set("date", "14/03/2025".to_string());
        fields.set("status", "cancelled".to_string());

        let err = CreateEvent::try_from(fields).unwrap_err();
        assert_eq!(error_fields(err), ["date", "eventType", "maxParticipants", "status"]);
    }

    #[test]
    fn test_date_accepts_rfc3339() {
        let mut fields = full_fields();
        fields.set("date", "2025-03-14T00:00:00.000Z".to_string());
        let create = CreateEvent::try_from(fields).unwrap();
        assert_eq!(create.date, NaiveDate::from_ymd_opt(2025, 3, 14).unwrap());
    }

    #[test]
    fn test_update_treats_blank_typed_fields_as_absent() {
        let mut fields = EventFields::default();
        fields.set("title", " New ".to_string());
        fields.set("maxParticipants", "".to_string());
        fields.set("status", "completed".to_string());

        let update = UpdateEvent::try_from(fields).unwrap();
        assert_eq!(update.title.as_deref(), Some("New"));
        assert_eq!(update.max_participants, None);
        assert_eq!(update.status, Some(EventStatus::Completed));
        assert_eq!(update.venue, None);
    }

    #[test]
    fn test_update_rejects_blank_text_fields() {
        let mut fields = EventFields::default();
        fields.set("description", "   ".to_string());
        fields.set("venue", "".to_string());
        fields.set("time", "\t".to_string());
        fields.set("title", "  ".to_string());

        let err = UpdateEvent::try_from(fields).unwrap_err();
        assert_eq!(error_fields(err), ["description", "time", "title", "venue"]);
    }

    #[test]
    fn test_validate_fields_uses_json_names() {
        let mut fields = full_fields();
        fields.set("maxParticipants", "0".to_string());
        let create = CreateEvent::try_from(fields).unwrap();

        let err = validate_fields(&create).unwrap_err();
        assert_eq!(error_fields(err), ["maxParticipants"]);

        let mut fields = full_fields();
        fields.set("maxParticipants", "1".to_string());
        assert!(validate_fields(&CreateEvent::try_from(fields).unwrap()).is_ok());
    }
}
