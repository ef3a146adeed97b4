pub mod config;
pub mod error;
pub mod features;
pub mod loader;
pub mod model;
pub mod schema;
pub mod scorer;
pub mod util;
pub mod woe;

pub use error::ScoreError;
pub use scorer::{Scorer, Snapshot};
