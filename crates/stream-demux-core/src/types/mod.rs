pub mod packet;

pub use packet::{ConsumerId, Packet, StreamItem, Target};
