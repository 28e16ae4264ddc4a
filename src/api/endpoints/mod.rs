pub mod encounters;
pub mod health;
pub mod line_items;
pub mod queues;
