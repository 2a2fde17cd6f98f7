pub mod item;
pub mod mime;
pub mod raw;

pub use item::{MediaError, MediaItem};
pub use raw::{MediaSource, RawMedia, prepare_candidates};
