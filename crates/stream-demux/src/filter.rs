use stream_demux_core::{ConsumerId, Packet, Target};

/// Which packets a consumer receives
///
/// A consumer sees packets written to its stream name, packets addressed
/// directly to its id, and global terminal packets from `close_all`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    stream: String,
    consumer_id: ConsumerId,
}

impl Subscription {
    pub fn new(stream: impl Into<String>, consumer_id: ConsumerId) -> Self {
        Self {
            stream: stream.into(),
            consumer_id,
        }
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    pub fn consumer_id(&self) -> ConsumerId {
        self.consumer_id
    }

    pub fn matches_target(&self, target: &Target) -> bool {
        match target {
            Target::Stream(name) => *name == self.stream,
            Target::Consumer(id) => *id == self.consumer_id,
            Target::All => true,
        }
    }

    pub fn matches<T>(&self, packet: &Packet<T>) -> bool {
        self.matches_target(&packet.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_filter() {
        let sub = Subscription::new("hello", 1);
        assert!(sub.matches(&Packet::data(Target::stream("hello"), 1)));
        assert!(!sub.matches(&Packet::data(Target::stream("abc"), 1)));
        assert!(!sub.matches(&Packet::data(Target::stream("hello:sub"), 1)));
    }

    #[test]
    fn test_direct_address() {
        let sub = Subscription::new("hello", 7);
        assert!(sub.matches(&Packet::data(Target::Consumer(7), 1)));
        assert!(!sub.matches(&Packet::data(Target::Consumer(8), 1)));
    }

    #[test]
    fn test_global_marker() {
        let sub = Subscription::new("anything", 3);
        assert!(sub.matches(&Packet::<u8>::end(Target::All, None)));
    }
}
