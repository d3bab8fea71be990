use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use encoding_rs::Encoding;

use crate::error::Result;
use crate::model::{Book, Part};
use crate::registry::{Options, bool_option, string_option};
use crate::util::encoding_for_label;

use super::{ENCODING_OPTION, LINE_FEED_OPTION, PARAGRAPH_HEAD_OPTION, SKIP_EMPTY_LINES_OPTION};

pub const DEFAULT_LINE_FEED: &str = "\r\n";
pub const DEFAULT_PARAGRAPH_HEAD: &str = "    ";

/// Layout of written text.
#[derive(Debug, Clone)]
pub struct TxtStyle {
    /// Output encoding. encoding_rs cannot write UTF-16, so UTF-16 labels
    /// produce UTF-8.
    pub encoding: &'static Encoding,
    pub line_feed: String,
    pub paragraph_head: String,
    pub skip_empty_lines: bool,
}

impl Default for TxtStyle {
    fn default() -> Self {
        Self {
            encoding: encoding_rs::UTF_8,
            line_feed: DEFAULT_LINE_FEED.to_string(),
            paragraph_head: DEFAULT_PARAGRAPH_HEAD.to_string(),
            skip_empty_lines: false,
        }
    }
}

impl TxtStyle {
    /// Defaults overridden by `encoding`, `line_feed`, `paragraph_head` and
    /// `skip_empty_lines`.
    pub fn from_options(options: &Options) -> Result<Self> {
        let mut style = Self::default();
        if let Some(label) = string_option(options, ENCODING_OPTION)? {
            style.encoding = encoding_for_label(label)?;
        }
        if let Some(line_feed) = string_option(options, LINE_FEED_OPTION)? {
            style.line_feed = line_feed.to_string();
        }
        if let Some(head) = string_option(options, PARAGRAPH_HEAD_OPTION)? {
            style.paragraph_head = head.to_string();
        }
        if let Some(skip) = bool_option(options, SKIP_EMPTY_LINES_OPTION)? {
            style.skip_empty_lines = skip;
        }
        Ok(style)
    }

    /// Lay out `book` as text.
    pub fn render(&self, book: &Book) -> Result<String> {
        let mut out = String::new();
        out.push_str(book.title());
        out.push_str(&self.line_feed);
        if let Some(author) = book.author().filter(|a| !a.is_empty()) {
            out.push_str(author);
            out.push_str(&self.line_feed);
        }
        if let Some(intro) = book.intro() {
            for line in intro.lines(self.skip_empty_lines)? {
                self.push_paragraph(&mut out, &line);
            }
        }
        for part in book.iter() {
            self.render_part(part, &mut out)?;
        }
        Ok(out)
    }

    fn render_part(&self, part: &Part, out: &mut String) -> Result<()> {
        out.push_str(&self.line_feed);
        out.push_str(part.title());
        out.push_str(&self.line_feed);
        if part.is_section() {
            for child in part.iter() {
                self.render_part(child, out)?;
            }
        } else {
            for line in part.lines(self.skip_empty_lines)? {
                self.push_paragraph(out, &line);
            }
        }
        Ok(())
    }

    fn push_paragraph(&self, out: &mut String, line: &str) {
        let line = line.trim();
        if !line.is_empty() {
            out.push_str(&self.paragraph_head);
            out.push_str(line);
        } else if self.skip_empty_lines {
            return;
        }
        out.push_str(&self.line_feed);
    }
}

/// Registry entry point. See [`TxtStyle::from_options`] for the options.
pub fn make_txt(book: &Book, out: &mut dyn Write, options: &Options) -> Result<()> {
    let style = TxtStyle::from_options(options)?;
    let text = style.render(book)?;
    let (bytes, _, _) = style.encoding.encode(&text);
    out.write_all(&bytes)?;
    Ok(())
}

/// Write `book` to a UTF-8 text file with the default layout.
pub fn write_txt<P: AsRef<Path>>(book: &Book, path: P) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    make_txt(book, &mut out, &Options::new())?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::TextSource;
    use crate::model::Value;

    fn sample() -> Book {
        let mut book = Book::new("Walden", Some("Thoreau"));
        book.set_intro(Some(TextSource::raw("An account\n\nof two years")));
        book.new_child("Economy", "  When I wrote  \n\nthe following pages");
        let section = book.new_child("Part Two", "");
        section.new_child("Sounds", "But while we are confined");
        book
    }

    #[test]
    fn test_render_layout() {
        let style = TxtStyle {
            line_feed: "\n".into(),
            ..TxtStyle::default()
        };
        let text = style.render(&sample()).unwrap();
        assert_eq!(
            text,
            "Walden\nThoreau\n    An account\n\n    of two years\n\
             \nEconomy\n    When I wrote\n\n    the following pages\n\
             \nPart Two\n\nSounds\n    But while we are confined\n"
        );
    }

    #[test]
    fn test_skip_empty_lines_option() {
        let mut options = Options::new();
        options.insert(SKIP_EMPTY_LINES_OPTION.into(), Value::from(true));
        options.insert(LINE_FEED_OPTION.into(), Value::from("\n"));
        options.insert(PARAGRAPH_HEAD_OPTION.into(), Value::from("> "));
        let mut out = Vec::new();
        make_txt(&sample(), &mut out, &options).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Walden\nThoreau\n> An account\n> of two years\n"));
        assert!(!text.contains("\n\n>"));
    }

    #[test]
    fn test_encoded_output() {
        let book = Book::new("红楼梦", None);
        let mut options = Options::new();
        options.insert(ENCODING_OPTION.into(), Value::from("gb18030"));
        let mut out = Vec::new();
        make_txt(&book, &mut out, &options).unwrap();
        let (expected, _, _) = encoding_rs::GB18030.encode("红楼梦\r\n");
        assert_eq!(out, expected.as_ref());
    }
}
