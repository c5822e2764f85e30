pub mod like;
pub mod time;
