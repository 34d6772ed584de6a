mod atomic_write;
pub mod cmaq;
pub mod codec;
pub mod container;
mod error;
pub mod file_header;
pub mod griddesc;
pub mod model_output;
mod output;
pub mod wrfchemi;

pub use codec::{decode, encode, read_grid_file, write_grid_file};
pub use container::{AttrValue, Attributes, Dimension, GridFile, GridVariable, VarData};
pub use error::GridFileError;
pub use griddesc::{CoordSystem, GridDesc, GridDescription, GridEntry};
pub use model_output::ModelOutputExt;
pub use output::{write_all, NamedGridFile};
