//! Document model shared by every codec.
//!
//! This module contains:
//! - Attribute values and the observable attribute store
//! - The part tree (titled nodes owning their children)
//! - Chapter (cover and intro) and Book (metadata and named items)

mod attributes;
mod book;
mod chapter;
mod part;

pub use attributes::{AttributeEvent, Attributes, ObserverId, Opaque, Value};
pub use book::{
    AUTHOR_KEY, Book, DATE_KEY, GENRE_KEY, LANGUAGE_KEY, PUBLISHER_KEY, RIGHTS_KEY, STATE_KEY,
    SUBJECT_KEY,
};
pub use chapter::{COVER_KEY, Chapter, INTRO_KEY};
pub use part::{CleanupId, Part, TITLE_KEY};
