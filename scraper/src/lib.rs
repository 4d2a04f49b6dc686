pub mod checkpoint;
pub mod scrape;

pub use checkpoint::{write_json_atomic, CheckpointStore};
pub use scrape::{default_checkpoint_path, run, PostSource, ScrapeOptions};
