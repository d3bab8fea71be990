use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::io::{ContentSource, ReadSeek, SharedStream, TextSource, WindowContent};
use crate::model::{Book, Chapter, Value};
use crate::registry::Options;
use crate::util::decode_utf16le;

use super::text::{BlockList, UmdText, inflate};
use super::{
    CDS_KEY, CHUNK_HEADER_LEN, CHUNK_TAG, CONTENT_ID_KEY, ChunkType, DATA_HEADER_LEN, DATA_TAG,
    ImageFormat, LICENSE_KEY, MAGIC, UmdType, VENDOR_KEY,
};

/// Read a UMD file into a Book
pub fn read_umd<P: AsRef<Path>>(path: P) -> Result<Book> {
    let file = File::open(path)?;
    read_umd_from_reader(BufReader::new(file))
}

/// Read a UMD from any Read + Seek source.
///
/// The returned book keeps the reader alive: chapter text and the cover are
/// read from it on demand.
pub fn read_umd_from_reader<R: Read + Seek + Send + 'static>(reader: R) -> Result<Book> {
    parse_stream(SharedStream::new(reader))
}

/// Registry entry point. UMD parsing takes no options.
pub fn parse_umd(reader: Box<dyn ReadSeek>, _options: &Options) -> Result<Book> {
    parse_stream(SharedStream::from_boxed(reader))
}

/// Returns true if `reader` starts with the UMD magic number.
///
/// Consumes up to four bytes.
pub fn is_umd<R: Read>(reader: &mut R) -> Result<bool> {
    let mut magic = [0u8; 4];
    match reader.read_exact(&mut magic) {
        Ok(()) => Ok(u32::from_le_bytes(magic) == MAGIC),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn parse_stream(shared: SharedStream) -> Result<Book> {
    let mut stream = shared.lock();
    let start = stream.stream_position()?;
    let len = stream.seek(SeekFrom::End(0))?;
    stream.seek(SeekFrom::Start(start))?;

    let mut parser = UmdParser {
        stream: &mut **stream,
        shared: shared.clone(),
        pos: start,
        len,
        state: ParseState::default(),
    };
    parser.parse()?;
    parser.state.finish()
}

/// A chapter seen in the offset or title table.
#[derive(Debug, Default)]
struct PendingChapter {
    title: String,
    offset: u32,
}

/// Everything collected during one pass over the file.
#[derive(Debug, Default)]
struct ParseState {
    book: Book,
    umd_type: UmdType,
    content_length: Option<u32>,
    cover_format: ImageFormat,
    image_format: ImageFormat,
    owners: HashMap<u32, ChunkType>,
    blocks: BlockList,
    chapters: Vec<PendingChapter>,
    /// Number of chapters whose offset came from the offset table.
    offset_count: usize,
    year: Option<i32>,
    month: Option<u32>,
    day: Option<u32>,
}

impl ParseState {
    fn chapter_at(&mut self, index: usize) -> &mut PendingChapter {
        if index >= self.chapters.len() {
            self.chapters.resize_with(index + 1, PendingChapter::default);
        }
        &mut self.chapters[index]
    }

    /// Build the chapters over the shared block list and hand over the book.
    fn finish(self) -> Result<Book> {
        let ParseState {
            mut book,
            content_length,
            blocks,
            chapters,
            offset_count,
            year,
            month,
            day,
            ..
        } = self;

        if let Some(year) = year {
            let month = month.unwrap_or(1);
            let day = day.unwrap_or(1);
            match NaiveDate::from_ymd_opt(year, month, day) {
                Some(date) => book.set_date(Some(date)),
                None => debug!("ignoring invalid date {year}-{month}-{day}"),
            }
        }

        let blocks = Arc::new(blocks);
        let mut lengths = Vec::with_capacity(chapters.len());
        for (index, chapter) in chapters.iter().enumerate() {
            let length = if index + 1 < offset_count {
                let next = chapters[index + 1].offset;
                Some(next.checked_sub(chapter.offset).ok_or_else(|| {
                    Error::InvalidUmd(format!(
                        "chapter {} starts at {next}, before chapter {index} at {}",
                        index + 1,
                        chapter.offset
                    ))
                })?)
            } else if index + 1 == offset_count {
                match content_length {
                    Some(total) => Some(total.checked_sub(chapter.offset).ok_or_else(|| {
                        Error::InvalidUmd(format!(
                            "last chapter starts at {} beyond content length {total}",
                            chapter.offset
                        ))
                    })?),
                    None => None,
                }
            } else {
                // titled but absent from the offset table
                Some(0)
            };
            lengths.push(length);
        }

        for (chapter, length) in chapters.into_iter().zip(lengths) {
            let text = UmdText::new(Arc::clone(&blocks), chapter.offset, length);
            book.push(Chapter::with_text(
                chapter.title,
                TextSource::deferred(Arc::new(text)),
            ));
        }

        debug!(
            "parsed UMD {:?}: {} chapters over {} content blocks",
            book.title(),
            book.len(),
            blocks.len()
        );
        Ok(book)
    }
}

struct UmdParser<'a> {
    stream: &'a mut dyn ReadSeek,
    shared: SharedStream,
    pos: u64,
    len: u64,
    state: ParseState,
}

impl UmdParser<'_> {
    fn parse(&mut self) -> Result<()> {
        let magic = u32::from_le_bytes(self.read_array()?);
        if magic != MAGIC {
            return Err(Error::InvalidUmd(format!("bad magic number {magic:#010x}")));
        }

        while self.pos < self.len {
            let [tag] = self.read_array()?;
            match tag {
                CHUNK_TAG => self.read_chunk()?,
                DATA_TAG => self.read_data()?,
                other => {
                    return Err(Error::InvalidUmd(format!(
                        "unknown record tag {other:#04x} at offset {}",
                        self.pos - 1
                    )));
                }
            }
        }
        Ok(())
    }

    // --- Chunks ---

    fn read_chunk(&mut self) -> Result<()> {
        let header: [u8; 4] = self.read_array()?;
        let id = u16::from_le_bytes([header[0], header[1]]);
        let total = u32::from(header[3]);
        let Some(payload_len) = total.checked_sub(CHUNK_HEADER_LEN) else {
            return Err(Error::InvalidUmd(format!(
                "chunk {id:#x} has length {total}, shorter than its header"
            )));
        };
        let payload = self.read_bytes(payload_len as u64)?;
        let state = &mut self.state;

        match ChunkType::from(id) {
            ChunkType::Head => {
                let code = field(&payload, 0, id).map(|b| b[0])?;
                state.umd_type = UmdType::from_u8(code);
                if let UmdType::Unknown(code) = state.umd_type {
                    debug!("unknown UMD type {code}, content blocks will be skipped");
                }
            }
            ChunkType::Title => state.book.set_title(decode_utf16le(&payload)),
            ChunkType::Author => state.book.set_author(Some(&decode_utf16le(&payload))),
            ChunkType::Genre => state.book.set_genre(Some(&decode_utf16le(&payload))),
            ChunkType::Publisher => state.book.set_publisher(Some(&decode_utf16le(&payload))),
            ChunkType::Vendor => {
                state.book.set_attribute(VENDOR_KEY, decode_utf16le(&payload));
            }
            ChunkType::Year => state.year = date_field(&payload, "year"),
            ChunkType::Month => state.month = date_field(&payload, "month"),
            ChunkType::Day => state.day = date_field(&payload, "day"),
            ChunkType::ContentLength => {
                // zero means the length was not recorded
                state.content_length = Some(u32_field(&payload, 0, id)?).filter(|&n| n > 0);
            }
            ChunkType::ContentId => {
                let content_id = u32_field(&payload, 0, id)?;
                state.book.set_attribute(CONTENT_ID_KEY, i64::from(content_id));
            }
            ChunkType::CdsKey => {
                state.book.set_attribute(CDS_KEY, Value::opaque(payload));
            }
            ChunkType::LicenseKey => {
                state.book.set_attribute(LICENSE_KEY, Value::opaque(payload));
            }
            ChunkType::ImageType => {
                state.image_format = ImageFormat::from_u8(field(&payload, 0, id)?[0]);
            }
            ChunkType::Cover => {
                state.cover_format = ImageFormat::from_u8(field(&payload, 0, id)?[0]);
                let key = u32_field(&payload, 1, id)?;
                state.owners.insert(key, ChunkType::Cover);
            }
            ChunkType::PageOffsets => {
                let key = u32_field(&payload, 2, id)?;
                state.owners.insert(key, ChunkType::PageOffsets);
            }
            kind @ (ChunkType::ContentEnd
            | ChunkType::ChapterOffsets
            | ChunkType::ChapterTitles
            | ChunkType::KeyOnly(_)) => {
                let key = u32_field(&payload, 0, id)?;
                state.owners.insert(key, kind);
            }
            ChunkType::End => {
                let expected = u32_field(&payload, 0, id)?;
                let actual = self.pos - u64::from(payload_len) + 4;
                if u64::from(expected) != actual {
                    return Err(Error::InvalidUmd(format!(
                        "end chunk records position {expected} but was read at {actual}"
                    )));
                }
            }
            ChunkType::Unknown(id) => debug!("skipping unknown chunk {id:#x} ({payload_len} bytes)"),
        }
        Ok(())
    }

    // --- Data blocks ---

    fn read_data(&mut self) -> Result<()> {
        let key = u32::from_le_bytes(self.read_array()?);
        let total = u32::from_le_bytes(self.read_array()?);
        let Some(length) = total.checked_sub(DATA_HEADER_LEN) else {
            return Err(Error::InvalidUmd(format!(
                "data block {key:#x} has length {total}, shorter than its header"
            )));
        };
        let length = u64::from(length);
        let offset = self.pos;
        if offset + length > self.len {
            return Err(Error::InvalidUmd(format!(
                "data block {key:#x} at offset {offset} runs past end of file"
            )));
        }

        match self.state.owners.remove(&key) {
            None => self.read_content(offset, length)?,
            Some(ChunkType::ChapterOffsets) => {
                let payload = self.read_bytes(length)?;
                self.read_chapter_offsets(&payload);
            }
            Some(ChunkType::ChapterTitles) => {
                let payload = self.read_bytes(length)?;
                self.read_chapter_titles(&payload)?;
            }
            Some(ChunkType::Cover) => {
                if length == 0 {
                    warn!("cover block {key:#x} is empty, leaving book without cover");
                } else {
                    let name = format!("cover.{}", self.state.cover_format.name());
                    let cover = self.window(name, offset, length);
                    self.state.book.set_cover(Some(ContentSource::Window(cover)));
                }
                self.skip(length)?;
            }
            Some(owner) => {
                debug!("skipping {length} bytes of {owner:?} data");
                self.skip(length)?;
            }
        }
        Ok(())
    }

    /// A block no chunk claimed: a piece of the book content.
    fn read_content(&mut self, offset: u64, length: u64) -> Result<()> {
        match self.state.umd_type {
            UmdType::Text => {
                let name = format!("block_{}", self.state.blocks.len());
                let block = self.window(name, offset, length);
                self.state.blocks.push(block);
                self.skip(length)?;
            }
            UmdType::Cartoon => {
                let name = format!(
                    "comic_{}.{}",
                    self.state.book.item_count() + 1,
                    self.state.image_format.name()
                );
                let packed = self.read_bytes(length)?;
                let image = match inflate(&packed) {
                    Ok(image) => ContentSource::memory(name.clone(), image),
                    Err(e) => {
                        warn!("{name} is not zlib-compressed ({e}), keeping stored bytes");
                        ContentSource::Window(self.window(name.clone(), offset, length))
                    }
                };
                self.state.book.set_item(name, image);
            }
            UmdType::Comic => {
                debug!("ignoring {length} bytes of comic content");
                self.skip(length)?;
            }
            UmdType::Unknown(code) => {
                debug!("ignoring {length} bytes of content for UMD type {code}");
                self.skip(length)?;
            }
        }
        Ok(())
    }

    fn read_chapter_offsets(&mut self, payload: &[u8]) {
        let state = &mut self.state;
        let offsets = payload.chunks_exact(4);
        if !offsets.remainder().is_empty() {
            debug!("ignoring {} trailing bytes of chapter offsets", offsets.remainder().len());
        }
        let mut count = 0;
        for (index, raw) in offsets.enumerate() {
            let offset = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
            state.chapter_at(index).offset = offset;
            count = index + 1;
        }
        state.offset_count = count;
    }

    fn read_chapter_titles(&mut self, payload: &[u8]) -> Result<()> {
        let mut rest = payload;
        let mut index = 0;
        while let Some((&size, tail)) = rest.split_first() {
            let size = usize::from(size);
            let Some(raw) = tail.get(..size) else {
                return Err(Error::InvalidUmd(format!(
                    "chapter title {index} needs {size} bytes, {} left",
                    tail.len()
                )));
            };
            self.state.chapter_at(index).title = decode_utf16le(raw);
            rest = &tail[size..];
            index += 1;
        }
        Ok(())
    }

    // --- Stream access ---

    /// A window whose bounds `read_data` already checked.
    fn window(&self, name: String, offset: u64, length: u64) -> WindowContent {
        WindowContent::new_unchecked(name, self.shared.clone(), offset, length)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.fill(&mut buf)?;
        Ok(buf)
    }

    fn read_bytes(&mut self, count: u64) -> Result<Vec<u8>> {
        self.ensure(count)?;
        let mut buf = vec![0u8; count as usize];
        self.fill(&mut buf)?;
        Ok(buf)
    }

    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        match self.stream.read_exact(buf) {
            Ok(()) => {
                self.pos += buf.len() as u64;
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(Error::InvalidUmd(format!(
                "unexpected end of file reading {} bytes at offset {}",
                buf.len(),
                self.pos
            ))),
            Err(e) => Err(e.into()),
        }
    }

    fn skip(&mut self, count: u64) -> Result<()> {
        self.ensure(count)?;
        self.pos = self.stream.seek(SeekFrom::Current(count as i64))?;
        Ok(())
    }

    fn ensure(&self, count: u64) -> Result<()> {
        if self.pos + count > self.len {
            return Err(Error::InvalidUmd(format!(
                "record at offset {} needs {count} bytes but the file ends at {}",
                self.pos, self.len
            )));
        }
        Ok(())
    }
}

/// `payload[at]` onwards, which must hold at least one byte.
fn field(payload: &[u8], at: usize, id: u16) -> Result<&[u8]> {
    match payload.get(at..) {
        Some(rest) if !rest.is_empty() => Ok(rest),
        _ => Err(Error::InvalidUmd(format!("chunk {id:#x} is too short"))),
    }
}

fn u32_field(payload: &[u8], at: usize, id: u16) -> Result<u32> {
    payload
        .get(at..at + 4)
        .and_then(|raw| raw.try_into().ok())
        .map(u32::from_le_bytes)
        .ok_or_else(|| Error::InvalidUmd(format!("chunk {id:#x} is too short for a 32-bit field")))
}

fn date_field<T: std::str::FromStr>(payload: &[u8], what: &str) -> Option<T> {
    let text = decode_utf16le(payload);
    let parsed = text.trim().parse().ok();
    if parsed.is_none() {
        debug!("ignoring unparsable {what} {text:?}");
    }
    parsed
}
