//! UMD ebook decoder.
//!
//! A UMD file is a little-endian stream of tagged records after a 4-byte
//! magic number. `#` records are metadata chunks; `$` records are data
//! blocks tied to an earlier chunk by a correlation key, or, when no chunk
//! claimed the key, pieces of the book content. Text content is split into
//! independently zlib-compressed blocks of [`BLOCK_SIZE`] UTF-16 characters
//! and chapter boundaries are character offsets into the concatenation.
//!
//! Chapter text is not decoded while parsing; each chapter keeps a handle on
//! the shared block list and decodes its range when asked.

mod reader;
mod text;

pub use reader::{is_umd, parse_umd, read_umd, read_umd_from_reader};
pub use text::{BLOCK_SIZE, BlockList, UmdText};

/// Registry name of the format.
pub const FORMAT_NAME: &str = "umd";

/// Magic number at the start of every UMD file.
pub const MAGIC: u32 = 0xde9a_9b89;

/// Record tag introducing a metadata chunk (`#`).
pub const CHUNK_TAG: u8 = 0x23;
/// Record tag introducing a data block (`$`).
pub const DATA_TAG: u8 = 0x24;

/// Bytes of a chunk header, counting the tag.
pub const CHUNK_HEADER_LEN: u32 = 5;
/// Bytes of a data block header, counting the tag.
pub const DATA_HEADER_LEN: u32 = 9;

/// Attribute holding the vendor string.
pub const VENDOR_KEY: &str = "vendor";
/// Attribute holding the numeric content id.
pub const CONTENT_ID_KEY: &str = "content_id";
/// Attribute holding the raw CDS key bytes.
pub const CDS_KEY: &str = "cds_key";
/// Attribute holding the raw license key bytes.
pub const LICENSE_KEY: &str = "license_key";

/// Kind of content a UMD file carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UmdType {
    #[default]
    Text,
    /// Pages stored as images.
    Cartoon,
    /// Recognised but not decoded.
    Comic,
    /// A type code this decoder does not know; content blocks are skipped.
    Unknown(u8),
}

impl UmdType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Text,
            2 => Self::Cartoon,
            3 => Self::Comic,
            other => Self::Unknown(other),
        }
    }
}

/// Image encoding of the cover and cartoon pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageFormat {
    Bmp,
    #[default]
    Jpg,
    Gif,
}

impl ImageFormat {
    /// Unknown codes fall back to JPEG.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Bmp,
            2 => Self::Gif,
            _ => Self::Jpg,
        }
    }

    /// File extension for this format.
    pub fn name(self) -> &'static str {
        match self {
            Self::Bmp => "bmp",
            Self::Jpg => "jpg",
            Self::Gif => "gif",
        }
    }

    /// Format for a file extension. Unknown names fall back to JPEG.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "bmp" => Self::Bmp,
            "gif" => Self::Gif,
            _ => Self::Jpg,
        }
    }
}

/// Metadata chunk ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum ChunkType {
    Head,
    Title,
    Author,
    Year,
    Month,
    Day,
    Genre,
    Publisher,
    Vendor,
    ContentId,
    ContentLength,
    End,
    ImageType,
    ContentEnd,
    Cover,
    ChapterOffsets,
    ChapterTitles,
    PageOffsets,
    CdsKey,
    LicenseKey,
    /// Ids that only declare a correlation key (0x85, 0x86).
    KeyOnly(u16),
    Unknown(u16),
}

impl From<u16> for ChunkType {
    fn from(id: u16) -> Self {
        match id {
            0x01 => Self::Head,
            0x02 => Self::Title,
            0x03 => Self::Author,
            0x04 => Self::Year,
            0x05 => Self::Month,
            0x06 => Self::Day,
            0x07 => Self::Genre,
            0x08 => Self::Publisher,
            0x09 => Self::Vendor,
            0x0A => Self::ContentId,
            0x0B => Self::ContentLength,
            0x0C => Self::End,
            0x0E => Self::ImageType,
            0x81 => Self::ContentEnd,
            0x82 => Self::Cover,
            0x83 => Self::ChapterOffsets,
            0x84 => Self::ChapterTitles,
            0x85 | 0x86 => Self::KeyOnly(id),
            0x87 => Self::PageOffsets,
            0xF0 => Self::CdsKey,
            0xF1 => Self::LicenseKey,
            other => Self::Unknown(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_format_names() {
        assert_eq!(ImageFormat::from_u8(0).name(), "bmp");
        assert_eq!(ImageFormat::from_u8(1).name(), "jpg");
        assert_eq!(ImageFormat::from_u8(2).name(), "gif");
        assert_eq!(ImageFormat::from_u8(9), ImageFormat::Jpg);
        assert_eq!(ImageFormat::from_name("GIF"), ImageFormat::Gif);
        assert_eq!(ImageFormat::from_name("jpeg"), ImageFormat::Jpg);
    }

    #[test]
    fn test_chunk_ids() {
        assert_eq!(ChunkType::from(0x83), ChunkType::ChapterOffsets);
        assert_eq!(ChunkType::from(0x86), ChunkType::KeyOnly(0x86));
        assert_eq!(ChunkType::from(0x0D), ChunkType::Unknown(0x0D));
        assert_eq!(UmdType::from_u8(2), UmdType::Cartoon);
        assert_eq!(UmdType::from_u8(7), UmdType::Unknown(7));
    }
}
