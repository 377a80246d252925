pub mod classifier;
pub mod history;

pub use classifier::{extreme_short_candidates, AlertClassifier, ClassificationOutcome, PriceMoves};
pub use history::{AlertHistory, InMemoryAlertHistory, JsonlAlertHistory};
