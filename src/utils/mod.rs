pub mod fs;
pub mod path;

pub use path::{ is_within, join_paths, normalize_path };
