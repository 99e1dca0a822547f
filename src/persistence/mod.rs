pub mod state;
pub mod store;

pub use state::{load_json, save_json, ALL_KEYS};
pub use store::{FileStore, MemoryStore, StateStore, StoreError};
