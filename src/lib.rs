//! # tome
//!
//! A structured book model with codecs for UMD and plain-text ebooks.
//!
//! ## Features
//!
//! - Books as trees of titled parts with observable attributes
//! - Lazy content: files, windows of a shared stream, ZIP entries
//! - UMD decoding with on-demand chapter text
//! - Plain-text reading (regex chapter detection) and writing
//! - A format registry for front ends
//!
//! ## Quick Start
//!
//! ```no_run
//! use tome::read_umd;
//!
//! let book = read_umd("novel.umd").unwrap();
//! println!("{} by {}", book.title(), book.author().unwrap_or("unknown"));
//! for chapter in book.iter() {
//!     // text is decompressed here, not while parsing
//!     let text = chapter.text().unwrap();
//!     println!("{}: {} chars", chapter.title(), text.chars().count());
//! }
//! ```
//!
//! ## Building Books
//!
//! ```
//! use tome::{Book, FormatRegistry, Options};
//!
//! let mut book = Book::new("Walden", Some("Henry David Thoreau"));
//! book.new_child("Economy", "When I wrote the following pages...");
//! book.new_child("Sounds", "But while we are confined to books...");
//!
//! let registry = FormatRegistry::with_builtin();
//! let mut out = Vec::new();
//! registry.write_to(&book, &mut out, "txt", &Options::new()).unwrap();
//! assert!(String::from_utf8(out).unwrap().starts_with("Walden\r\n"));
//! ```

pub mod error;
pub mod io;
pub mod model;
pub mod registry;
pub mod txt;
pub mod umd;
pub(crate) mod util;

pub use error::{Error, Result};
pub use io::{ContentSource, SharedArchive, SharedStream, TextSource};
pub use model::{AttributeEvent, Attributes, Book, Chapter, Part, Value};
pub use registry::{FormatRegistry, Options};
pub use txt::{make_txt, parse_txt, read_txt, write_txt};
pub use umd::{is_umd, parse_umd, read_umd, read_umd_from_reader};
