pub mod exif_reader;

pub use exif_reader::{extract_metadata, MetadataReport};
