//! Token-based output file naming.

pub mod template;
pub mod timestamp;

pub use template::{
    DEFAULT_MULTI_CHANNEL_PATTERN, DEFAULT_PATTERN, FilenamePattern, RenderContext, Token, render,
    sanitize_file_stem, validate,
};
pub use timestamp::format_timestamp;
