use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

use chrono::NaiveDate;

use crate::model::{Chapter, Value};

pub const AUTHOR_KEY: &str = "author";
pub const GENRE_KEY: &str = "genre";
pub const STATE_KEY: &str = "state";
pub const SUBJECT_KEY: &str = "subject";
pub const DATE_KEY: &str = "date";
pub const PUBLISHER_KEY: &str = "publisher";
pub const RIGHTS_KEY: &str = "rights";
pub const LANGUAGE_KEY: &str = "language";

/// String attribute accessors: `name()` reads, `set_name()` writes, and
/// setting `None` removes the attribute.
macro_rules! string_attributes {
    ($($get:ident, $set:ident => $key:ident;)*) => {
        $(
            pub fn $get(&self) -> Option<&str> {
                self.attribute($key).and_then(|v| v.as_str().ok())
            }

            pub fn $set(&mut self, value: Option<&str>) {
                match value {
                    Some(value) => {
                        self.set_attribute($key, value);
                    }
                    None => {
                        self.remove_attribute($key);
                    }
                }
            }
        )*
    };
}

/// A whole book: the root chapter plus bibliographic metadata and a map of
/// named auxiliary items (images, keys, embedded files) outside the tree.
#[derive(Debug, Default)]
pub struct Book {
    chapter: Chapter,
    items: BTreeMap<String, Value>,
}

impl Book {
    pub fn new(title: impl Into<String>, author: Option<&str>) -> Self {
        let mut book = Self {
            chapter: Chapter::new(title),
            items: BTreeMap::new(),
        };
        book.set_author(author);
        book
    }

    string_attributes! {
        author, set_author => AUTHOR_KEY;
        genre, set_genre => GENRE_KEY;
        state, set_state => STATE_KEY;
        subject, set_subject => SUBJECT_KEY;
        publisher, set_publisher => PUBLISHER_KEY;
        rights, set_rights => RIGHTS_KEY;
        language, set_language => LANGUAGE_KEY;
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.attribute(DATE_KEY).and_then(|v| v.as_date().ok())
    }

    pub fn set_date(&mut self, date: Option<NaiveDate>) {
        match date {
            Some(date) => {
                self.set_attribute(DATE_KEY, date);
            }
            None => {
                self.remove_attribute(DATE_KEY);
            }
        }
    }

    // --- Items ---

    /// Store an item, returning the value it replaces.
    pub fn set_item(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.items.insert(name.into(), value.into())
    }

    pub fn item(&self, name: &str) -> Option<&Value> {
        self.items.get(name)
    }

    pub fn remove_item(&mut self, name: &str) -> Option<Value> {
        self.items.remove(name)
    }

    /// Items sorted by name.
    pub fn items(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.items.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn clear_items(&mut self) {
        self.items.clear();
    }

    pub fn into_chapter(self) -> Chapter {
        self.chapter
    }
}

impl Deref for Book {
    type Target = Chapter;

    fn deref(&self) -> &Chapter {
        &self.chapter
    }
}

impl DerefMut for Book {
    fn deref_mut(&mut self) -> &mut Chapter {
        &mut self.chapter
    }
}
