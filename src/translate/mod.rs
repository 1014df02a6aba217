//! The translator-facing side of the pipeline: formatting segments for an
//! external translator and merging its output back.

pub mod chunk;
pub mod merge;
pub mod prompt;

pub use chunk::{chunk_segments, format_segment, format_segments, single_block, FormattedTexts};
pub use merge::{merge, parse_segments, MergeOutcome, TranslationInput};
pub use prompt::{batch_instructions, translation_instructions, LanguagePair};
