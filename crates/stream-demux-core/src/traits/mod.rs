pub mod consumer;

pub use consumer::LogConsumer;
