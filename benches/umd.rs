//! Benchmarks for UMD decoding.
//!
//! Run with: cargo bench

use std::io::{Cursor, Write};

use criterion::{Criterion, criterion_group, criterion_main};
use flate2::Compression;
use flate2::write::ZlibEncoder;

use tome::umd::BLOCK_SIZE;
use tome::{FormatRegistry, Options, read_umd_from_reader};

const CHAPTERS: u32 = 40;
const CHAPTER_CHARS: u32 = 6000;

fn utf16(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

fn chunk(out: &mut Vec<u8>, id: u16, payload: &[u8]) {
    out.push(0x23);
    out.extend_from_slice(&id.to_le_bytes());
    out.push(0);
    out.push((payload.len() + 5) as u8);
    out.extend_from_slice(payload);
}

fn data(out: &mut Vec<u8>, key: u32, payload: &[u8]) {
    out.push(0x24);
    out.extend_from_slice(&key.to_le_bytes());
    out.extend_from_slice(&((payload.len() + 9) as u32).to_le_bytes());
    out.extend_from_slice(payload);
}

/// A text UMD with many chapters spread over several content blocks.
fn sample_umd() -> Vec<u8> {
    let total = CHAPTERS * CHAPTER_CHARS;
    let text: String = (0..total)
        .map(|i| if i % 80 == 79 { '\u{2029}' } else { '文' })
        .collect();
    let units: Vec<u16> = text.encode_utf16().collect();

    let mut out = 0xde9a_9b89u32.to_le_bytes().to_vec();
    chunk(&mut out, 0x01, &[1, 0, 0]);
    chunk(&mut out, 0x02, &utf16("Benchmark"));
    chunk(&mut out, 0x0B, &total.to_le_bytes());

    let offsets: Vec<u8> = (0..CHAPTERS)
        .flat_map(|i| (i * CHAPTER_CHARS).to_le_bytes())
        .collect();
    chunk(&mut out, 0x83, &0x1000u32.to_le_bytes());
    data(&mut out, 0x1000, &offsets);

    let mut titles = Vec::new();
    for i in 0..CHAPTERS {
        let raw = utf16(&format!("Chapter {i}"));
        titles.push(raw.len() as u8);
        titles.extend_from_slice(&raw);
    }
    chunk(&mut out, 0x84, &0x1001u32.to_le_bytes());
    data(&mut out, 0x1001, &titles);

    for (index, block) in units.chunks(BLOCK_SIZE as usize).enumerate() {
        let raw: Vec<u8> = block.iter().flat_map(|u| u.to_le_bytes()).collect();
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw).unwrap();
        data(&mut out, 0x2000 + index as u32, &encoder.finish().unwrap());
    }
    out
}

// ============================================================================
// Parsing
// ============================================================================

fn bench_parse(c: &mut Criterion) {
    let bytes = sample_umd();

    c.bench_function("parse_umd", |b| {
        b.iter(|| read_umd_from_reader(Cursor::new(bytes.clone())).unwrap());
    });
}

// ============================================================================
// Text Decoding
// ============================================================================

fn bench_chapter_text(c: &mut Criterion) {
    let book = read_umd_from_reader(Cursor::new(sample_umd())).unwrap();

    c.bench_function("umd_chapter_text", |b| {
        b.iter(|| book.get(7).unwrap().text().unwrap());
    });

    c.bench_function("umd_all_text", |b| {
        b.iter(|| {
            book.iter()
                .map(|chapter| chapter.text().unwrap().len())
                .sum::<usize>()
        });
    });
}

fn bench_convert_to_txt(c: &mut Criterion) {
    let registry = FormatRegistry::with_builtin();
    let book = read_umd_from_reader(Cursor::new(sample_umd())).unwrap();

    c.bench_function("umd_to_txt", |b| {
        b.iter(|| {
            let mut out = Vec::new();
            registry.write_to(&book, &mut out, "txt", &Options::new()).unwrap();
            out
        });
    });
}

criterion_group!(benches, bench_parse, bench_chapter_text, bench_convert_to_txt);
criterion_main!(benches);
