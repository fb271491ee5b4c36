pub mod duration;

pub use duration::{format_seconds, parse_duration};
