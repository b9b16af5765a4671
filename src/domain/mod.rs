pub mod logs;
pub mod tags;
