//! Events Domain
//!
//! College events stored in MongoDB, each with an optional poster image kept
//! in a local blob directory.
//!
//! # Request flow
//!
//! ```text
//! multipart form ─► EventForm ─► CreateEvent / UpdateEvent ─► validate
//!                      │
//!                      └─► UploadedImage ─► validate_image ─► BlobStore::put
//!                                                                  │
//!                                   EventRepository (MongoDB) ◄────┘
//! ```
//!
//! A blob written for a request that then fails is removed again, so the
//! blob directory only holds images some event refers to.

pub mod blob;
pub mod error;
pub mod form;
pub mod handlers;
pub mod models;
pub mod mongodb;
pub mod repository;
pub mod service;
pub mod upload;

pub use blob::{BlobStore, BlobStoreConfig, LocalBlobStore};
pub use error::{EventError, Result};
pub use form::{EventFields, EventForm};
pub use handlers::{ApiDoc, router as events_router};
pub use models::{
    CreateEvent, DeleteResponse, Event, EventPatch, EventStatus, EventType, NewEvent, PatchedEvent,
    SearchQuery, UpdateEvent,
};
pub use mongodb::MongoEventRepository;
pub use repository::EventRepository;
pub use service::EventService;
pub use upload::{DEFAULT_MAX_IMAGE_BYTES, UploadedImage};
