// Reports module - dense historical series and point-in-time holdings

pub mod history;
pub mod holdings;
