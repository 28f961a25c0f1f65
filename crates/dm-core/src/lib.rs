pub mod error;
pub mod index;
pub mod path;
pub mod resolver;
pub mod types;

pub use error::MapperError;
pub use index::{IndexedNode, TreeIndex};
pub use path::{get_path, parse_path, render_path, set_path, PathSegment, MAX_INDEX_GAP};
pub use resolver::{
    access_expression, access_expression_for_segments, full_path, is_plain_identifier,
    quote_string, render_access, sanitize_identifier, LoopBinding, SOURCE_DATA_ROOT,
};
pub use types::*;
