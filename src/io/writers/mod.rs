pub mod tags;
pub mod tiff;

pub use tiff::write_index_tiff;
