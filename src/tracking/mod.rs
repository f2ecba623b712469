pub mod position;
pub mod speed;
pub mod tracker;
