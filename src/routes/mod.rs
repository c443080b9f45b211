pub mod health;
pub mod hints;
pub mod progress;
pub mod quiz;
