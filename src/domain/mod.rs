// Domain layer - Plain data and pure functions
pub mod calendar;
pub mod monitor;
pub mod notification;
