pub mod parse;
pub mod types;

pub use parse::parse_action_list;
pub use types::{Action, ActionList, ScrollDirection};
