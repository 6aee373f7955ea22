pub mod elo;
pub mod engine;
pub mod types;

pub use elo::EloEngine;
pub use engine::RatingEngine;
pub use types::{PlayerRatingOutcome, ResultRatingOutcome};
