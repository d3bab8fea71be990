//! Format registry: format name to parser and maker.
//!
//! Front ends build one registry at startup, usually with
//! [`FormatRegistry::with_builtin`], and pass it to whatever needs lookup.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};
use crate::io::ReadSeek;
use crate::model::{Book, Value};
use crate::util::extension_name;

/// Options handed to parsers and makers.
pub type Options = HashMap<String, Value>;

/// Attribute recording the path a book was read from.
pub const SOURCE_PATH_KEY: &str = "source_path";
/// Attribute recording the format a book was read as.
pub const SOURCE_FORMAT_KEY: &str = "source_format";

/// Reads a book from a stream.
pub type Parser = Arc<dyn Fn(Box<dyn ReadSeek>, &Options) -> Result<Book> + Send + Sync>;

/// Writes a book to a stream.
pub type Maker = Arc<dyn Fn(&Book, &mut dyn Write, &Options) -> Result<()> + Send + Sync>;

#[derive(Default, Clone)]
struct Entry {
    parser: Option<Parser>,
    maker: Option<Maker>,
}

/// Name to (parser, maker) table. Names are case-insensitive ASCII.
#[derive(Default, Clone)]
pub struct FormatRegistry {
    formats: BTreeMap<String, Entry>,
}

impl FormatRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the formats this crate implements.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register_parser(crate::umd::FORMAT_NAME, crate::umd::parse_umd);
        registry.register_parser(crate::txt::FORMAT_NAME, crate::txt::parse_txt);
        registry.register_maker(crate::txt::FORMAT_NAME, crate::txt::make_txt);
        registry
    }

    /// Register `parser` for `name`, replacing any previous one.
    pub fn register_parser<F>(&mut self, name: &str, parser: F)
    where
        F: Fn(Box<dyn ReadSeek>, &Options) -> Result<Book> + Send + Sync + 'static,
    {
        self.formats.entry(normalize(name)).or_default().parser = Some(Arc::new(parser));
    }

    /// Register `maker` for `name`, replacing any previous one.
    pub fn register_maker<F>(&mut self, name: &str, maker: F)
    where
        F: Fn(&Book, &mut dyn Write, &Options) -> Result<()> + Send + Sync + 'static,
    {
        self.formats.entry(normalize(name)).or_default().maker = Some(Arc::new(maker));
    }

    pub fn parser(&self, name: &str) -> Option<&Parser> {
        self.formats.get(&normalize(name))?.parser.as_ref()
    }

    pub fn maker(&self, name: &str) -> Option<&Maker> {
        self.formats.get(&normalize(name))?.maker.as_ref()
    }

    pub fn has_parser(&self, name: &str) -> bool {
        self.parser(name).is_some()
    }

    pub fn has_maker(&self, name: &str) -> bool {
        self.maker(name).is_some()
    }

    /// Names with a parser, sorted.
    pub fn parsers(&self) -> Vec<&str> {
        self.formats
            .iter()
            .filter(|(_, entry)| entry.parser.is_some())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Names with a maker, sorted.
    pub fn makers(&self) -> Vec<&str> {
        self.formats
            .iter()
            .filter(|(_, entry)| entry.maker.is_some())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Read a book from a file.
    ///
    /// The format defaults to the file extension. The path and format are
    /// recorded as the `source_path` and `source_format` attributes.
    pub fn read_book<P: AsRef<Path>>(&self, path: P, format: Option<&str>, options: &Options) -> Result<Book> {
        let path = path.as_ref();
        let format = resolve_format(path, format)?;
        if !self.has_parser(&format) {
            return Err(Error::UnsupportedFormat(format!("no parser for {format}")));
        }
        let file = File::open(path)?;
        let mut book = self.read_from(BufReader::new(file), &format, options)?;
        book.set_attribute(SOURCE_PATH_KEY, path.to_string_lossy().into_owned());
        book.set_attribute(SOURCE_FORMAT_KEY, format);
        Ok(book)
    }

    /// Read a book in `format` from a stream.
    pub fn read_from<R>(&self, reader: R, format: &str, options: &Options) -> Result<Book>
    where
        R: Read + Seek + Send + 'static,
    {
        let parser = self
            .parser(format)
            .ok_or_else(|| Error::UnsupportedFormat(format!("no parser for {format}")))?;
        debug!("parsing {format}");
        parser(Box::new(reader), options)
    }

    /// Write a book to a file. The format defaults to the file extension.
    pub fn write_book<P: AsRef<Path>>(
        &self,
        book: &Book,
        path: P,
        format: Option<&str>,
        options: &Options,
    ) -> Result<()> {
        let path = path.as_ref();
        let format = resolve_format(path, format)?;
        let mut out = BufWriter::new(File::create(path)?);
        self.write_to(book, &mut out, &format, options)?;
        out.flush()?;
        Ok(())
    }

    /// Write a book in `format` to a stream.
    pub fn write_to(&self, book: &Book, out: &mut dyn Write, format: &str, options: &Options) -> Result<()> {
        let maker = self
            .maker(format)
            .ok_or_else(|| Error::UnsupportedFormat(format!("no maker for {format}")))?;
        debug!("making {format}");
        maker(book, out, options)
    }

    /// Read `input` and write it to `output`, returning the book.
    pub fn convert<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input: P,
        input_format: Option<&str>,
        output: Q,
        output_format: Option<&str>,
        options: &Options,
    ) -> Result<Book> {
        let output = output.as_ref();
        let output_format = resolve_format(output, output_format)?;
        if !self.has_maker(&output_format) {
            return Err(Error::UnsupportedFormat(format!("no maker for {output_format}")));
        }
        let book = self.read_book(input, input_format, options)?;
        self.write_book(&book, output, Some(&output_format), options)?;
        Ok(book)
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

fn resolve_format(path: &Path, format: Option<&str>) -> Result<String> {
    match format {
        Some(format) => Ok(normalize(format)),
        None => extension_name(path).ok_or_else(|| {
            Error::UnsupportedFormat(format!("cannot tell the format of {}", path.display()))
        }),
    }
}

// --- Option access ---

/// String option `key`, if set.
pub fn string_option<'a>(options: &'a Options, key: &str) -> Result<Option<&'a str>> {
    options.get(key).map(Value::as_str).transpose()
}

/// Boolean option `key`, if set.
pub fn bool_option(options: &Options, key: &str) -> Result<Option<bool>> {
    options.get(key).map(Value::as_bool).transpose()
}
