mod error;
mod path;
mod props;

pub use error::Error;
pub use path::{absolute, is_canonical, is_directory, is_regular, mkdirs, strip_last_component};
pub use props::{Parser, PropSet};
