use crate::types::Packet;

/// A consumer registered with a [`SharedLog`](crate::SharedLog)
///
/// The log calls into registered consumers on every append. Implementations
/// hold the shared half of a consumer (counters, wake signal); the cursor
/// itself stays with whoever drives the consumer.
pub trait LogConsumer<T>: Send + Sync {
    /// Whether the packet is addressed to this consumer
    fn accepts(&self, packet: &Packet<T>) -> bool;

    /// Charge one unit of backlog for an accepted packet
    ///
    /// Called while the log lock is held and before the new node is linked,
    /// so the consumer can never observe the node before it is counted.
    /// Must not call back into the log.
    fn apply_backpressure(&self, packet: &Packet<T>);

    /// Wake a suspended reader. Called after the log lock is released.
    fn wake(&self);
}
