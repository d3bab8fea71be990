//! Lazy chapter text over the shared list of compressed content blocks.

use std::io::Read;
use std::sync::Arc;

use flate2::read::ZlibDecoder;

use crate::error::{Error, Result};
use crate::io::{TextProvider, WindowContent};
use crate::util::{LINE_BREAK, decode_utf16le};

/// UTF-16 characters held by each content block before compression.
pub const BLOCK_SIZE: u32 = 0x8000;

const PARAGRAPH_SEPARATOR: char = '\u{2029}';

/// Ordered, still-compressed content blocks of one UMD file.
///
/// Shared by every chapter produced by the same parse.
#[derive(Debug, Default)]
pub struct BlockList {
    blocks: Vec<WindowContent>,
}

impl BlockList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, block: WindowContent) {
        self.blocks.push(block);
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&WindowContent> {
        self.blocks.get(index)
    }

    /// Decompress block `index` to UTF-16LE bytes.
    pub fn decompress(&self, index: usize) -> Result<Vec<u8>> {
        let block = self.blocks.get(index).ok_or_else(|| {
            Error::Reference(format!(
                "content block {index} requested but only {} exist",
                self.blocks.len()
            ))
        })?;
        inflate(&block.read()?)
            .map_err(|e| Error::InvalidUmd(format!("content block {index} is not valid zlib: {e}")))
    }

    /// Decode `length` characters starting at character `offset`.
    ///
    /// Without a length the text runs to the end of the last block. Paragraph
    /// separators become platform line breaks.
    pub fn text(&self, offset: u32, length: Option<u32>) -> Result<String> {
        if length == Some(0) {
            return Ok(String::new());
        }

        let first = (offset / BLOCK_SIZE) as usize;
        let start = (offset % BLOCK_SIZE) as usize * 2;
        let end = length.map(|length| start + length as usize * 2);

        let mut data = Vec::new();
        let mut index = first;
        loop {
            if let Some(end) = end
                && data.len() >= end
            {
                break;
            }
            if index >= self.blocks.len() {
                if end.is_some() || index == first {
                    return Err(Error::Reference(format!(
                        "text at character {offset} runs past the {} content blocks",
                        self.blocks.len()
                    )));
                }
                break;
            }
            data.extend_from_slice(&self.decompress(index)?);
            index += 1;
        }

        let end = end.unwrap_or(data.len());
        let bytes = data.get(start..end).ok_or_else(|| {
            Error::Reference(format!("character offset {offset} lies past the end of the content"))
        })?;
        Ok(decode_utf16le(bytes).replace(PARAGRAPH_SEPARATOR, LINE_BREAK))
    }
}

/// Inflate one zlib stream.
pub(crate) fn inflate(compressed: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(compressed);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

/// The text of one UMD chapter: a character range of a shared [`BlockList`].
///
/// The blocks are decompressed again on every access.
#[derive(Debug, Clone)]
pub struct UmdText {
    blocks: Arc<BlockList>,
    offset: u32,
    length: Option<u32>,
}

impl UmdText {
    pub fn new(blocks: Arc<BlockList>, offset: u32, length: Option<u32>) -> Self {
        Self {
            blocks,
            offset,
            length,
        }
    }

    /// Character offset of the chapter.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Character length; `None` runs to the end of the content.
    pub fn length(&self) -> Option<u32> {
        self.length
    }

    pub fn blocks(&self) -> &Arc<BlockList> {
        &self.blocks
    }
}

impl TextProvider for UmdText {
    fn text(&self) -> Result<String> {
        self.blocks.text(self.offset, self.length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::SharedStream;
    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use std::io::{Cursor, Write};

    fn utf16(text: &str) -> Vec<u8> {
        text.encode_utf16().flat_map(u16::to_le_bytes).collect()
    }

    fn compress(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    /// A block list whose blocks hold the given texts.
    fn blocks(texts: &[&str]) -> BlockList {
        let mut file = Vec::new();
        let mut ranges = Vec::new();
        for text in texts {
            let packed = compress(&utf16(text));
            ranges.push((file.len() as u64, packed.len() as u64));
            file.extend_from_slice(&packed);
        }
        let stream = SharedStream::new(Cursor::new(file));
        let mut list = BlockList::new();
        for (i, (offset, length)) in ranges.into_iter().enumerate() {
            list.push(WindowContent::new(format!("block_{i}"), stream.clone(), offset, length).unwrap());
        }
        list
    }

    #[test]
    fn test_single_block_ranges() {
        let list = blocks(&["HelloWorld"]);
        assert_eq!(list.text(0, Some(5)).unwrap(), "Hello");
        assert_eq!(list.text(5, Some(5)).unwrap(), "World");
        assert_eq!(list.text(3, None).unwrap(), "loWorld");
        assert_eq!(list.text(7, Some(0)).unwrap(), "");
    }

    #[test]
    fn test_range_crosses_block_boundary() {
        let first = "a".repeat(BLOCK_SIZE as usize - 2) + "bc";
        let list = blocks(&[&first, "defg"]);
        assert_eq!(list.text(BLOCK_SIZE - 2, Some(4)).unwrap(), "bcde");
        assert_eq!(list.text(BLOCK_SIZE + 1, Some(2)).unwrap(), "ef");
    }

    #[test]
    fn test_paragraph_separator_becomes_line_break() {
        let list = blocks(&["one\u{2029}two"]);
        assert_eq!(list.text(0, None).unwrap(), format!("one{LINE_BREAK}two"));
    }

    #[test]
    fn test_range_past_content_is_reference_error() {
        let list = blocks(&["short"]);
        assert!(matches!(list.text(0, Some(50)), Err(Error::Reference(_))));
        assert!(matches!(list.text(BLOCK_SIZE, None), Err(Error::Reference(_))));
        assert!(matches!(list.text(9, None), Err(Error::Reference(_))));
    }

    #[test]
    fn test_corrupt_block_is_format_error() {
        let stream = SharedStream::new(Cursor::new(b"not zlib at all".to_vec()));
        let mut list = BlockList::new();
        list.push(WindowContent::new("block_0", stream, 0, 15).unwrap());
        assert!(matches!(list.text(0, None), Err(Error::InvalidUmd(_))));
    }
}
