pub mod text;

// Re-export the splitter for external use
pub use text::{SplitError, TextChunk, TextSplitter, split_text};
