//! Hand-built UMD streams for integration tests.

#![allow(dead_code)]

use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;

pub const MAGIC: u32 = 0xde9a_9b89;

pub fn utf16(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

pub fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Appends UMD records in the order the methods are called.
pub struct UmdBuilder {
    data: Vec<u8>,
}

impl Default for UmdBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl UmdBuilder {
    pub fn new() -> Self {
        Self {
            data: MAGIC.to_le_bytes().to_vec(),
        }
    }

    /// Raw metadata chunk; the length byte is computed.
    pub fn chunk(mut self, id: u16, payload: &[u8]) -> Self {
        self.data.push(0x23);
        self.data.extend_from_slice(&id.to_le_bytes());
        self.data.push(0);
        self.data.push((payload.len() + 5) as u8);
        self.data.extend_from_slice(payload);
        self
    }

    /// Raw data block; the length field is computed.
    pub fn data(mut self, key: u32, payload: &[u8]) -> Self {
        self.data.push(0x24);
        self.data.extend_from_slice(&key.to_le_bytes());
        self.data.extend_from_slice(&((payload.len() + 9) as u32).to_le_bytes());
        self.data.extend_from_slice(payload);
        self
    }

    pub fn head(self, umd_type: u8) -> Self {
        self.chunk(0x01, &[umd_type, 0x00, 0x00])
    }

    pub fn title(self, title: &str) -> Self {
        self.chunk(0x02, &utf16(title))
    }

    pub fn author(self, author: &str) -> Self {
        self.chunk(0x03, &utf16(author))
    }

    pub fn content_length(self, chars: u32) -> Self {
        self.chunk(0x0B, &chars.to_le_bytes())
    }

    /// Chapter offset chunk followed by its data block.
    pub fn chapter_offsets(self, key: u32, offsets: &[u32]) -> Self {
        let payload: Vec<u8> = offsets.iter().flat_map(|o| o.to_le_bytes()).collect();
        self.chunk(0x83, &key.to_le_bytes()).data(key, &payload)
    }

    /// Chapter title chunk followed by its data block.
    pub fn chapter_titles(self, key: u32, titles: &[&str]) -> Self {
        let mut payload = Vec::new();
        for title in titles {
            let raw = utf16(title);
            payload.push(raw.len() as u8);
            payload.extend_from_slice(&raw);
        }
        self.chunk(0x84, &key.to_le_bytes()).data(key, &payload)
    }

    /// Anonymous content block holding `text` compressed.
    pub fn content(self, key: u32, text: &str) -> Self {
        self.data(key, &zlib(&utf16(text)))
    }

    /// Cover chunk followed by its image block.
    pub fn cover(self, format: u8, key: u32, image: &[u8]) -> Self {
        let mut payload = vec![format];
        payload.extend_from_slice(&key.to_le_bytes());
        self.chunk(0x82, &payload).data(key, image)
    }

    /// End chunk recording the position just after its own field.
    pub fn end(self) -> Self {
        let position = self.data.len() as u32 + 9;
        self.end_at(position)
    }

    pub fn end_at(self, position: u32) -> Self {
        self.chunk(0x0C, &position.to_le_bytes())
    }

    pub fn build(self) -> Vec<u8> {
        self.data
    }
}

/// `count` characters cycling through the alphabet.
pub fn alphabet_text(count: usize) -> String {
    (0..count).map(|i| (b'a' + (i % 26) as u8) as char).collect()
}
