//! Plain-text books.
//!
//! Reading splits the decoded text at lines matching a chapter pattern; text
//! before the first heading becomes the book's introduction. Writing lays the
//! tree out as a title block followed by each part's title and indented lines.

mod reader;
mod writer;

pub use reader::{DEFAULT_CHAPTER_PATTERN, parse_txt, parse_txt_str, read_txt};
pub use writer::{DEFAULT_LINE_FEED, DEFAULT_PARAGRAPH_HEAD, TxtStyle, make_txt, write_txt};

/// Registry name of the format.
pub const FORMAT_NAME: &str = "txt";

/// Option naming the character encoding.
pub const ENCODING_OPTION: &str = "encoding";
/// Option holding the chapter heading regex.
pub const CHAPTER_PATTERN_OPTION: &str = "chapter_pattern";
/// Option holding the book title.
pub const TITLE_OPTION: &str = "title";
/// Option holding the line terminator written between lines.
pub const LINE_FEED_OPTION: &str = "line_feed";
/// Option holding the indent written before each paragraph.
pub const PARAGRAPH_HEAD_OPTION: &str = "paragraph_head";
/// Option dropping empty lines when writing.
pub const SKIP_EMPTY_LINES_OPTION: &str = "skip_empty_lines";
