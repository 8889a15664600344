//! Output formats, image writing and output-folder lookup.

pub mod format;
pub mod locate;
pub mod writer;

pub use format::OutputFormat;
pub use locate::{ALTERNATIVE_EXTENSIONS, ensure_writable, locate_output, resolve_output_dir};
pub use writer::{DiskWriter, ImageWriter, write_image};
