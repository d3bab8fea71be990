//! Lazy content and text sources shared by the model and the codecs.

mod content;
mod text;

pub use content::{
    ArchiveContent, ArchiveState, ContentSource, FileContent, MemoryContent, ReadSeek,
    SharedArchive, SharedStream, WindowContent,
};
pub use text::{TextProvider, TextSource, split_lines};
