//! Lazy text: an owned string, encoded bytes behind a [`ContentSource`], or a
//! provider that computes the text on demand.

use std::fmt;
use std::io::Write;
use std::sync::Arc;

use encoding_rs::Encoding;
use memchr::memchr2;

use crate::error::Result;
use crate::io::ContentSource;
use crate::util::encoding_for_label;

/// Computes text on demand.
///
/// Implemented by codecs whose text is decoded lazily from the source file,
/// such as UMD chapters.
pub trait TextProvider: fmt::Debug + Send + Sync {
    fn text(&self) -> Result<String>;
}

/// Lazy text content of a part.
#[derive(Debug, Clone)]
pub enum TextSource {
    /// Text held in memory.
    Raw(String),
    /// Encoded text read from a content source when needed.
    Content {
        source: ContentSource,
        encoding: &'static Encoding,
    },
    /// Text computed by a provider on every access.
    Deferred(Arc<dyn TextProvider>),
}

impl Default for TextSource {
    fn default() -> Self {
        Self::Raw(String::new())
    }
}

impl TextSource {
    pub fn raw(text: impl Into<String>) -> Self {
        Self::Raw(text.into())
    }

    /// Text stored in `source` with the encoding named by `label`.
    ///
    /// Without a label the bytes are read as UTF-8; a byte order mark in the
    /// content overrides either choice.
    pub fn from_content(source: ContentSource, label: Option<&str>) -> Result<Self> {
        let encoding = match label {
            Some(label) => encoding_for_label(label)?,
            None => encoding_rs::UTF_8,
        };
        Ok(Self::Content { source, encoding })
    }

    pub fn deferred(provider: Arc<dyn TextProvider>) -> Self {
        Self::Deferred(provider)
    }

    /// The in-memory text, if this source holds one.
    pub fn as_raw(&self) -> Option<&str> {
        match self {
            Self::Raw(text) => Some(text),
            _ => None,
        }
    }

    /// The backing content source, if any.
    pub fn content(&self) -> Option<&ContentSource> {
        match self {
            Self::Content { source, .. } => Some(source),
            _ => None,
        }
    }

    pub fn encoding(&self) -> Option<&'static Encoding> {
        match self {
            Self::Content { encoding, .. } => Some(encoding),
            _ => None,
        }
    }

    /// Materialize the full text.
    pub fn text(&self) -> Result<String> {
        match self {
            Self::Raw(text) => Ok(text.clone()),
            Self::Content { source, encoding } => {
                let bytes = source.read_all()?;
                let (text, _, _) = encoding.decode(&bytes);
                Ok(text.into_owned())
            }
            Self::Deferred(provider) => provider.text(),
        }
    }

    /// Lines of the text split on CR, LF or CRLF.
    pub fn lines(&self, skip_empty: bool) -> Result<Vec<String>> {
        let text = self.text()?;
        Ok(split_lines(&text, skip_empty)
            .into_iter()
            .map(str::to_string)
            .collect())
    }

    /// Write up to `limit` characters (all when `None`) to `out` in `encoding`.
    ///
    /// Returns the number of characters written. encoding_rs cannot produce
    /// UTF-16, so UTF-16 requests are written as UTF-8.
    pub fn write_to(
        &self,
        out: &mut dyn Write,
        encoding: &'static Encoding,
        limit: Option<usize>,
    ) -> Result<usize> {
        let text = self.text()?;
        let (text, count) = match limit {
            Some(limit) => match text.char_indices().nth(limit) {
                Some((end, _)) => (&text[..end], limit),
                None => (text.as_str(), text.chars().count()),
            },
            None => (text.as_str(), text.chars().count()),
        };
        let (bytes, _, _) = encoding.encode(text);
        out.write_all(&bytes)?;
        Ok(count)
    }
}

impl PartialEq for TextSource {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Raw(a), Self::Raw(b)) => a == b,
            (
                Self::Content {
                    source: a,
                    encoding: ea,
                },
                Self::Content {
                    source: b,
                    encoding: eb,
                },
            ) => a == b && ea == eb,
            (Self::Deferred(a), Self::Deferred(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<String> for TextSource {
    fn from(text: String) -> Self {
        Self::Raw(text)
    }
}

impl From<&str> for TextSource {
    fn from(text: &str) -> Self {
        Self::Raw(text.to_string())
    }
}

/// Split `text` on CR, LF or CRLF.
///
/// A trailing line break does not produce a final empty line.
pub fn split_lines(text: &str, skip_empty: bool) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut lines = Vec::new();
    let mut start = 0;

    while let Some(found) = memchr2(b'\r', b'\n', &bytes[start..]) {
        let end = start + found;
        let line = &text[start..end];
        if !(skip_empty && line.is_empty()) {
            lines.push(line);
        }
        start = if bytes[end] == b'\r' && bytes.get(end + 1) == Some(&b'\n') {
            end + 2
        } else {
            end + 1
        };
    }

    if start < text.len() {
        lines.push(&text[start..]);
    }
    lines
}
