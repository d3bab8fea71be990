use std::fs;
use std::io::Read;
use std::path::Path;

use regex::{Regex, RegexBuilder};
use tracing::debug;

use crate::error::{Error, Result};
use crate::io::{ReadSeek, TextSource};
use crate::model::{Book, Chapter};
use crate::registry::{Options, string_option};
use crate::util::{decode_text, encoding_for_label};

use super::{CHAPTER_PATTERN_OPTION, ENCODING_OPTION, TITLE_OPTION};

/// Heading pattern used when no `chapter_pattern` option is given.
pub const DEFAULT_CHAPTER_PATTERN: &str = r"^Chapter\s+\d+.*$";

/// Read a plain-text file with default options.
pub fn read_txt<P: AsRef<Path>>(path: P) -> Result<Book> {
    let bytes = fs::read(path)?;
    parse_bytes(&bytes, &Options::new())
}

/// Registry entry point.
///
/// Options: `encoding` (label; default UTF-8 falling back to Windows-1252),
/// `chapter_pattern` (regex matched per line), `title`.
pub fn parse_txt(mut reader: Box<dyn ReadSeek>, options: &Options) -> Result<Book> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    parse_bytes(&bytes, options)
}

fn parse_bytes(bytes: &[u8], options: &Options) -> Result<Book> {
    let text = match string_option(options, ENCODING_OPTION)? {
        Some(label) => {
            let (text, _, malformed) = encoding_for_label(label)?.decode(bytes);
            if malformed {
                debug!("text is not valid {label}, replaced malformed sequences");
            }
            text.into_owned()
        }
        None => decode_text(bytes, None).into_owned(),
    };
    let title = string_option(options, TITLE_OPTION)?.unwrap_or("");
    let pattern = string_option(options, CHAPTER_PATTERN_OPTION)?.unwrap_or(DEFAULT_CHAPTER_PATTERN);
    parse_txt_str(&text, title, pattern)
}

/// Split decoded text into a book.
///
/// Each line matching `pattern` starts a chapter titled by the trimmed line;
/// text before the first heading becomes the introduction.
pub fn parse_txt_str(text: &str, title: &str, pattern: &str) -> Result<Book> {
    let heading = compile(pattern)?;
    let mut book = Book::new(title, None);

    let matches: Vec<_> = heading.find_iter(text).filter(|m| !m.is_empty()).collect();
    let intro_end = matches.first().map_or(text.len(), |m| m.start());
    let intro = text[..intro_end].trim();
    if !intro.is_empty() {
        book.set_intro(Some(TextSource::raw(intro)));
    }

    for (index, found) in matches.iter().enumerate() {
        let end = matches.get(index + 1).map_or(text.len(), |next| next.start());
        let body = text[found.end()..end]
            .trim_start_matches(['\r', '\n'])
            .trim_end();
        book.push(Chapter::with_text(found.as_str().trim(), body));
    }

    debug!("split text into {} chapters", book.len());
    Ok(book)
}

fn compile(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .multi_line(true)
        .crlf(true)
        .build()
        .map_err(|e| Error::InvalidText(format!("bad chapter pattern {pattern:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Value;

    const SAMPLE: &str = "Preface line\r\n\r\nChapter 1 Beginnings\r\nFirst text.\r\nMore.\r\n\r\nChapter 2\r\nSecond text.\r\n";

    #[test]
    fn test_split_on_default_pattern() {
        let book = parse_txt_str(SAMPLE, "Sample", DEFAULT_CHAPTER_PATTERN).unwrap();
        assert_eq!(book.title(), "Sample");
        assert_eq!(book.intro().unwrap().text().unwrap(), "Preface line");
        assert_eq!(book.len(), 2);

        let first = book.get(0).unwrap();
        assert_eq!(first.title(), "Chapter 1 Beginnings");
        assert_eq!(first.lines(true).unwrap(), vec!["First text.", "More."]);
        assert_eq!(book.get(1).unwrap().text().unwrap(), "Second text.");
    }

    #[test]
    fn test_no_headings_is_all_intro() {
        let book = parse_txt_str("just words\nand more", "", DEFAULT_CHAPTER_PATTERN).unwrap();
        assert!(book.is_empty());
        assert_eq!(book.intro().unwrap().text().unwrap(), "just words\nand more");
    }

    #[test]
    fn test_custom_pattern_and_encoding() {
        let text = "第1章\n甲\n第2章\n乙";
        let (bytes, _, _) = encoding_rs::GB18030.encode(text);
        let mut options = Options::new();
        options.insert(ENCODING_OPTION.into(), Value::from("gb18030"));
        options.insert(CHAPTER_PATTERN_OPTION.into(), Value::from(r"^第\d+章$"));
        let book = parse_bytes(&bytes, &options).unwrap();
        assert_eq!(book.len(), 2);
        assert_eq!(book.get(1).unwrap().title(), "第2章");
        assert_eq!(book.get(1).unwrap().text().unwrap(), "乙");
    }

    #[test]
    fn test_bad_pattern() {
        assert!(matches!(
            parse_txt_str("x", "", "(unclosed"),
            Err(Error::InvalidText(_))
        ));
    }
}
