//! Content source tests.
//!
//! Windows and archive entries share one cursor between many sources; reads
//! through any of them must leave that cursor where the owner put it.

use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use tempfile::NamedTempFile;
use tome::{ContentSource, Error, SharedArchive, SharedStream, TextSource};
use zip::{CompressionMethod, ZipWriter};
use zip::write::SimpleFileOptions;

fn archive_bytes() -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    writer.start_file("chapter1.txt", options).unwrap();
    writer.write_all(b"It was a dark and stormy night.").unwrap();
    writer.start_file("images/cover.png", options).unwrap();
    writer.write_all(b"\x89PNG\r\n\x1a\n").unwrap();
    writer.finish().unwrap().into_inner()
}

// ============================================================================
// Shared Streams
// ============================================================================

#[test]
fn test_window_read_keeps_stream_position() {
    let stream = SharedStream::new(Cursor::new(b"0123456789abcdef".to_vec()));
    stream.lock().seek(SeekFrom::Start(3)).unwrap();

    let window = ContentSource::window("tail.bin", stream.clone(), 10, 6).unwrap();
    let mut reader = window.open_stream().unwrap();
    let mut data = Vec::new();
    reader.read_to_end(&mut data).unwrap();
    window.reset().unwrap();
    assert_eq!(data, b"abcdef");

    let mut next = [0u8; 1];
    stream.lock().read_exact(&mut next).unwrap();
    assert_eq!(&next, b"3");
}

#[test]
fn test_windows_share_one_stream() {
    let stream = SharedStream::new(Cursor::new(b"headerBODYtrailer".to_vec()));
    let body = ContentSource::window("body", stream.clone(), 6, 4).unwrap();
    let trailer = ContentSource::window("trailer", stream, 10, 7).unwrap();

    assert_eq!(trailer.read_all().unwrap(), b"trailer");
    assert_eq!(body.read_all().unwrap(), b"BODY");
    assert_eq!(body.available().unwrap(), 4);
}

#[test]
fn test_copy_to_stops_at_limit() {
    let stream = SharedStream::new(Cursor::new(b"lorem ipsum dolor".to_vec()));
    let window = ContentSource::window("w", stream, 6, 11).unwrap();
    let mut out = Vec::new();
    assert_eq!(window.copy_to(&mut out, Some(5)).unwrap(), 5);
    assert_eq!(out, b"ipsum");
}

// ============================================================================
// Archives
// ============================================================================

#[test]
fn test_archive_entry_preserves_current_entry() {
    let archive = SharedArchive::new(Cursor::new(archive_bytes())).unwrap();
    archive.lock().select("images/cover.png").unwrap();

    let chapter = ContentSource::archive_entry(archive.clone(), "chapter1.txt").unwrap();
    assert_eq!(chapter.mime(), "text/plain");
    assert_eq!(chapter.read_all().unwrap(), b"It was a dark and stormy night.");
    assert_eq!(archive.current_entry().as_deref(), Some("images/cover.png"));

    let cover = ContentSource::archive_entry(archive.clone(), "images/cover.png").unwrap();
    assert_eq!(cover.mime(), "image/png");
    assert_eq!(cover.available().unwrap(), 8);
}

#[test]
fn test_entry_with_inflated_declared_size() {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    writer.start_file("notes.txt", options).unwrap();
    writer.write_all(b"short entry").unwrap();
    let mut bytes = writer.finish().unwrap().into_inner();

    // claim ~2 GiB uncompressed in the central directory
    let central = bytes
        .windows(4)
        .position(|w| w == b"PK\x01\x02")
        .unwrap();
    bytes[central + 24..central + 28].copy_from_slice(&0x7FFF_FFF0u32.to_le_bytes());

    let archive = SharedArchive::new(Cursor::new(bytes)).unwrap();
    let entry = ContentSource::archive_entry(archive, "notes.txt").unwrap();
    match entry.read_all() {
        Ok(data) => assert_eq!(data, b"short entry"),
        Err(e) => assert!(matches!(e, Error::Zip(_) | Error::Io(_))),
    }
}

#[test]
fn test_missing_archive_entry() {
    let archive = SharedArchive::new(Cursor::new(archive_bytes())).unwrap();
    assert!(matches!(
        ContentSource::archive_entry(archive, "missing.txt"),
        Err(Error::Reference(_))
    ));
}

// ============================================================================
// Files and Text
// ============================================================================

#[test]
fn test_file_content() {
    let mut file = NamedTempFile::with_suffix(".txt").unwrap();
    file.write_all("café".as_bytes()).unwrap();
    file.flush().unwrap();

    let content = ContentSource::file(file.path()).unwrap();
    assert_eq!(content.mime(), "text/plain");
    assert_eq!(content.available().unwrap(), 5);
    assert_eq!(content.read_all().unwrap(), "café".as_bytes());
    assert_eq!(content, ContentSource::file(file.path()).unwrap());
}

#[test]
fn test_missing_file() {
    assert!(matches!(
        ContentSource::file("/nonexistent/book.umd"),
        Err(Error::Reference(_))
    ));
}

#[test]
fn test_text_from_encoded_content() {
    let (bytes, _, _) = encoding_rs::GBK.encode("第一章\n正文");
    let content = ContentSource::memory("chapter.txt", bytes.into_owned());
    let text = TextSource::from_content(content, Some("gbk")).unwrap();
    assert_eq!(text.text().unwrap(), "第一章\n正文");
    assert_eq!(text.lines(false).unwrap(), vec!["第一章", "正文"]);

    let mut out = Vec::new();
    assert_eq!(text.write_to(&mut out, encoding_rs::UTF_8, Some(3)).unwrap(), 3);
    assert_eq!(String::from_utf8(out).unwrap(), "第一章");
}

#[test]
fn test_unknown_text_encoding() {
    let content = ContentSource::memory("a.txt", b"abc".to_vec());
    assert!(matches!(
        TextSource::from_content(content, Some("klingon")),
        Err(Error::UnknownEncoding(_))
    ));
}
