mod buffer;
mod data_source;

pub use self::data_source::{StreamHealth, StreamingDataSource};
