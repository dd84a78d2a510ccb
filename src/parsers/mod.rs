pub mod listing;
pub mod top;

pub use listing::{parse_nodes, parse_pods};
pub use top::{TopKind, parse_top};
