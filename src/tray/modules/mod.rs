//! Built-in modules.

pub mod add_nulls;
pub mod bottomless_source;
pub mod dump;
pub mod many_streams_source;
pub mod trash_can;

pub use add_nulls::AddNulls;
pub use bottomless_source::BottomlessSource;
pub use dump::Dump;
pub use many_streams_source::ManyStreamsSource;
pub use trash_can::TrashCan;
