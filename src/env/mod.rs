use indexmap::IndexMap;

pub type VarMap = IndexMap<String, String>;

mod loader;
mod placeholders;

pub use loader::load_env_file;
pub use placeholders::{find_unresolved, resolve};
