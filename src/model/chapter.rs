use std::ops::{Deref, DerefMut};

use crate::io::{ContentSource, TextSource};
use crate::model::{Part, Value};

/// Attribute holding a chapter's cover image.
pub const COVER_KEY: &str = "cover";
/// Attribute holding a chapter's introduction text.
pub const INTRO_KEY: &str = "intro";

/// A part with an optional cover image and introduction.
#[derive(Debug, Default)]
pub struct Chapter {
    part: Part,
}

impl Chapter {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            part: Part::new(title),
        }
    }

    pub fn with_text(title: impl Into<String>, text: impl Into<TextSource>) -> Self {
        Self {
            part: Part::with_text(title, text),
        }
    }

    /// Set or clear the cover image.
    pub fn set_cover(&mut self, cover: Option<ContentSource>) {
        match cover {
            Some(cover) => {
                self.part.set_attribute(COVER_KEY, Value::Content(cover));
            }
            None => {
                self.part.remove_attribute(COVER_KEY);
            }
        }
    }

    /// Set or clear the introduction.
    pub fn set_intro(&mut self, intro: Option<TextSource>) {
        match intro {
            Some(intro) => {
                self.part.set_attribute(INTRO_KEY, Value::Text(intro));
            }
            None => {
                self.part.remove_attribute(INTRO_KEY);
            }
        }
    }

    pub fn into_part(self) -> Part {
        self.part
    }
}

/// Chapter accessors readable on any part, so children stored in a tree keep
/// their cover and intro.
impl Part {
    pub fn cover(&self) -> Option<&ContentSource> {
        self.attribute(COVER_KEY).and_then(|v| v.as_content().ok())
    }

    pub fn intro(&self) -> Option<&TextSource> {
        self.attribute(INTRO_KEY).and_then(|v| v.as_text().ok())
    }
}

impl Deref for Chapter {
    type Target = Part;

    fn deref(&self) -> &Part {
        &self.part
    }
}

impl DerefMut for Chapter {
    fn deref_mut(&mut self) -> &mut Part {
        &mut self.part
    }
}

impl From<Part> for Chapter {
    fn from(part: Part) -> Self {
        Self { part }
    }
}

impl From<Chapter> for Part {
    fn from(chapter: Chapter) -> Self {
        chapter.part
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cover_and_intro_are_attributes() {
        let mut chapter = Chapter::with_text("One", "body");
        assert!(chapter.cover().is_none());
        assert!(chapter.intro().is_none());

        chapter.set_cover(Some(ContentSource::memory("cover.jpg", vec![0xFF, 0xD8])));
        chapter.set_intro(Some(TextSource::raw("Once upon a time")));
        assert_eq!(chapter.cover().unwrap().mime(), "image/jpeg");
        assert_eq!(chapter.intro().unwrap().text().unwrap(), "Once upon a time");
        assert_eq!(
            chapter.attributes().names().collect::<Vec<_>>(),
            vec!["title", "cover", "intro"]
        );

        chapter.set_cover(None);
        assert!(!chapter.attributes().contains(COVER_KEY));
    }

    #[test]
    fn test_chapter_is_a_part() {
        let mut chapter = Chapter::new("Book I");
        chapter.new_child("Canto 1", "text");
        let part: Part = chapter.into();
        assert_eq!(part.len(), 1);
        assert_eq!(part.title(), "Book I");
    }
}
