/// Identifier assigned to a consumer by the shared log
pub type ConsumerId = u64;

/// Addressing tag carried by every packet
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    /// Delivered to every consumer subscribed to the named stream
    Stream(String),

    /// Delivered only to the consumer with this id
    Consumer(ConsumerId),

    /// Delivered to every consumer regardless of subscription
    All,
}

impl Target {
    pub fn stream(name: impl Into<String>) -> Self {
        Target::Stream(name.into())
    }
}

/// One item yielded to a consumer
///
/// `Done` is terminal: the consumer that yields it is already destroyed.
/// It may carry a final value supplied by `close` or `kill`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamItem<T> {
    Value(T),
    Done(Option<T>),
}

impl<T> StreamItem<T> {
    pub fn is_done(&self) -> bool {
        matches!(self, StreamItem::Done(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            StreamItem::Value(value) => Some(value),
            StreamItem::Done(value) => value.as_ref(),
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            StreamItem::Value(value) => Some(value),
            StreamItem::Done(value) => value,
        }
    }
}

/// Unit of log content. Immutable once appended.
#[derive(Debug, Clone)]
pub struct Packet<T> {
    pub target: Target,
    pub item: StreamItem<T>,
}

impl<T> Packet<T> {
    pub fn new(target: Target, item: StreamItem<T>) -> Self {
        Self { target, item }
    }

    pub fn data(target: Target, value: T) -> Self {
        Self::new(target, StreamItem::Value(value))
    }

    pub fn end(target: Target, value: Option<T>) -> Self {
        Self::new(target, StreamItem::Done(value))
    }

    pub fn is_done(&self) -> bool {
        self.item.is_done()
    }

    /// Short label used for logging and metrics
    pub fn kind(&self) -> &'static str {
        match (&self.target, self.is_done()) {
            (Target::Stream(_), false) => "write",
            (Target::Stream(_), true) => "close",
            (Target::Consumer(_), false) => "write_consumer",
            (Target::Consumer(_), true) => "close_consumer",
            (Target::All, _) => "close_all",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_values() {
        let item = StreamItem::Value(3);
        assert!(!item.is_done());
        assert_eq!(item.value(), Some(&3));

        let done: StreamItem<u32> = StreamItem::Done(None);
        assert!(done.is_done());
        assert_eq!(done.into_value(), None);

        assert_eq!(StreamItem::Done(Some(7)).into_value(), Some(7));
    }

    #[test]
    fn test_packet_kind() {
        assert_eq!(Packet::data(Target::stream("a"), 1).kind(), "write");
        assert_eq!(Packet::end(Target::stream("a"), Some(1)).kind(), "close");
        assert_eq!(Packet::data(Target::Consumer(4), 1).kind(), "write_consumer");
        assert_eq!(Packet::<u8>::end(Target::Consumer(4), None).kind(), "close_consumer");
        assert_eq!(Packet::<u8>::end(Target::All, None).kind(), "close_all");
    }
}
