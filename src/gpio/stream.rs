//! Pin Event Stream
//!
//! Hand-off between the active pin source and the broadcaster. The channel
//! holds a single event: a producer publishing while the previous event is
//! still undrained waits for the consumer.
//!
//! `PinSender` is not `Clone`: exactly one source owns it.

use tokio::sync::mpsc;

use super::error::StreamClosed;
use super::types::Pin;

/// Number of undelivered events the stream buffers
pub const STREAM_CAPACITY: usize = 1;

/// Create the producer/consumer pair
pub fn event_stream() -> (PinSender, PinReceiver) {
    let (tx, rx) = mpsc::channel(STREAM_CAPACITY);
    (PinSender { tx }, PinReceiver { rx })
}

/// Producer half, owned by the watcher or the simulator
#[derive(Debug)]
pub struct PinSender {
    tx: mpsc::Sender<Pin>,
}

impl PinSender {
    /// Publish a pin, waiting while the buffer is full
    pub async fn publish(&self, pin: Pin) -> Result<(), StreamClosed> {
        self.tx.send(pin).await.map_err(|_| StreamClosed)
    }

    /// Check whether the consumer is gone
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer half, owned by the broadcaster
#[derive(Debug)]
pub struct PinReceiver {
    rx: mpsc::Receiver<Pin>,
}

impl PinReceiver {
    /// Next pin event, `None` once the producer is dropped
    pub async fn next(&mut self) -> Option<Pin> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_publish_and_receive_in_order() {
        let (tx, mut rx) = event_stream();

        let producer = tokio::spawn(async move {
            for value in [1, 0, 1] {
                tx.publish(Pin::new(4, value)).await.unwrap();
            }
        });

        let mut seen = Vec::new();
        while let Some(pin) = rx.next().await {
            seen.push(pin.value);
        }
        producer.await.unwrap();
        assert_eq!(seen, vec![1, 0, 1]);
    }

    #[tokio::test]
    async fn test_publish_blocks_when_full() {
        let (tx, mut rx) = event_stream();
        tx.publish(Pin::new(4, 1)).await.unwrap();

        let second = tokio::time::timeout(Duration::from_millis(50), tx.publish(Pin::new(4, 0))).await;
        assert!(second.is_err(), "second publish should wait for the consumer");

        assert_eq!(rx.next().await, Some(Pin::new(4, 1)));
        tx.publish(Pin::new(4, 0)).await.unwrap();
        assert_eq!(rx.next().await, Some(Pin::new(4, 0)));
    }

    #[tokio::test]
    async fn test_publish_after_consumer_dropped() {
        let (tx, rx) = event_stream();
        drop(rx);
        assert!(tx.is_closed());
        assert_eq!(tx.publish(Pin::new(4, 1)).await, Err(StreamClosed));
    }
}
