#[macro_use]
extern crate lazy_static;

pub mod index;

pub use index::error::{IndexError, Result};
pub use index::opener::FileIndex;
pub use index::progress::{clear_progress_callback, register_progress_callback, ProgressPhase};
pub use index::{DirectoryEntry, IndexRecord, TypeDirectory};
