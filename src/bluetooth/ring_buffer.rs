//! Single-producer/single-consumer framed byte queue
//!
//! Sits between the radio receive callback and the stack's poll loop:
//! - The producer half is owned by the callback context and never blocks or allocates
//! - The consumer half is owned by the poll loop
//! - Frames are stored as a 2-byte big-endian length followed by the payload
//!
//! Bytes live in a lock-free `heapless` SPSC queue. Space for the whole frame
//! is checked before the first byte goes in, and the consumer holds a frame
//! back until all of its payload has arrived, so it never hands out a partial
//! frame.

use crate::bluetooth::constants::RING_BUFFER_SIZE;
use heapless::spsc::{Consumer, Producer, Queue};
use log::{error, warn};

const PREFIX_LEN: usize = 2;

type ByteQueue = Queue<u8, RING_BUFFER_SIZE>;

/// Fixed-capacity framed ring buffer, split into its two halves before use
pub struct RingBuffer {
    queue: &'static mut ByteQueue,
}

impl RingBuffer {
    /// Create an empty ring buffer.
    ///
    /// The storage is leaked so the halves can move to different threads, the
    /// same as a `static` queue on the device. A stack creates two of these
    /// for its whole lifetime.
    pub fn new() -> Self {
        Self {
            queue: Box::leak(Box::new(Queue::new())),
        }
    }

    /// Split into the producer and consumer halves
    pub fn split(self) -> (FrameProducer, FrameConsumer) {
        let (producer, consumer) = self.queue.split();
        (
            FrameProducer {
                queue: producer,
                dropping: false,
            },
            FrameConsumer {
                queue: consumer,
                pending: None,
            },
        )
    }
}

impl Default for RingBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Writing half of a [`RingBuffer`]
pub struct FrameProducer {
    queue: Producer<'static, u8, RING_BUFFER_SIZE>,
    dropping: bool,
}

impl FrameProducer {
    /// Enqueue a complete frame.
    ///
    /// Returns false if the frame was dropped for lack of space. Only the first
    /// drop after a successful put is logged.
    pub fn put(&mut self, frame: &[u8]) -> bool {
        // One slot always stays empty in the queue
        let space = (RING_BUFFER_SIZE - 1).saturating_sub(self.queue.len());
        let needed = frame.len() + PREFIX_LEN;

        if frame.len() > u16::MAX as usize || needed > space {
            if !self.dropping {
                warn!(
                    "Ring buffer can't fit frame ({} bytes, {} free), dropping",
                    needed, space
                );
            }
            self.dropping = true;
            return false;
        }
        self.dropping = false;

        let len = frame.len() as u16;
        for byte in len.to_be_bytes().into_iter().chain(frame.iter().copied()) {
            if self.queue.enqueue(byte).is_err() {
                error!("Ring buffer filled up mid-frame");
                return false;
            }
        }
        true
    }

    /// True while frames are being dropped
    pub fn is_dropping(&self) -> bool {
        self.dropping
    }
}

/// Reading half of a [`RingBuffer`]
pub struct FrameConsumer {
    queue: Consumer<'static, u8, RING_BUFFER_SIZE>,
    /// Length of a frame whose prefix was read but whose payload is still arriving
    pending: Option<usize>,
}

impl FrameConsumer {
    /// Dequeue the oldest frame into `buffer`.
    ///
    /// Returns the number of bytes copied, or `None` if no complete frame is
    /// queued. A frame larger than `buffer` is still removed whole, but only
    /// its prefix is copied.
    pub fn get(&mut self, buffer: &mut [u8]) -> Option<usize> {
        let len = match self.pending {
            Some(len) => len,
            None => {
                if self.queue.len() < PREFIX_LEN {
                    return None;
                }
                let high = self.queue.dequeue()?;
                let low = self.queue.dequeue()?;
                let len = u16::from_be_bytes([high, low]) as usize;
                self.pending = Some(len);
                len
            }
        };
        if self.queue.len() < len {
            return None;
        }
        self.pending = None;

        let copied = len.min(buffer.len());
        if copied < len {
            error!("Receive buffer too small: {}/{}", buffer.len(), len);
        }
        for index in 0..len {
            let byte = self.queue.dequeue()?;
            if let Some(slot) = buffer.get_mut(index) {
                *slot = byte;
            }
        }
        Some(copied)
    }

    /// True if nothing is waiting
    pub fn is_empty(&self) -> bool {
        self.pending.is_none() && !self.queue.ready()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::thread;

    #[test]
    fn frames_come_out_in_order() {
        let (mut tx, mut rx) = RingBuffer::new().split();
        assert!(tx.put(&[1, 2, 3]));
        assert!(tx.put(&[4]));
        assert!(tx.put(&[]));

        let mut buf = [0u8; 16];
        assert_eq!(rx.get(&mut buf), Some(3));
        assert_eq!(&buf[..3], &[1, 2, 3]);
        assert_eq!(rx.get(&mut buf), Some(1));
        assert_eq!(buf[0], 4);
        assert_eq!(rx.get(&mut buf), Some(0));
        assert_eq!(rx.get(&mut buf), None);
        assert!(rx.is_empty());
    }

    #[test]
    fn full_buffer_drops_without_corrupting_queue() {
        let (mut tx, mut rx) = RingBuffer::new().split();
        // 1023 usable bytes: 1000 + 2 prefix leaves 21
        let big = vec![0xAB; 1000];
        assert!(tx.put(&big));
        assert!(!tx.put(&[0u8; 20]));
        assert!(tx.is_dropping());
        assert!(!tx.put(&[0u8; 20]));
        assert!(tx.put(&[0u8; 19]));
        assert!(!tx.is_dropping());

        let mut buf = vec![0u8; 1024];
        assert_eq!(rx.get(&mut buf), Some(1000));
        assert!(buf[..1000].iter().all(|&b| b == 0xAB));
        assert_eq!(rx.get(&mut buf), Some(19));
        assert_eq!(rx.get(&mut buf), None);
    }

    #[test]
    fn oversized_frame_is_drained_whole() {
        let (mut tx, mut rx) = RingBuffer::new().split();
        let frame: Vec<u8> = (0..40).collect();
        assert!(tx.put(&frame));
        assert!(tx.put(&[9, 9]));

        let mut small = [0u8; 8];
        assert_eq!(rx.get(&mut small), Some(8));
        assert_eq!(small, [0, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(rx.get(&mut small), Some(2));
        assert_eq!(&small[..2], &[9, 9]);
    }

    #[test]
    fn partial_frame_is_held_back() {
        let (mut tx, mut rx) = RingBuffer::new().split();
        // A prefix promising three bytes with only one of them written so far
        assert!(tx.queue.enqueue(0).is_ok());
        assert!(tx.queue.enqueue(3).is_ok());
        assert!(tx.queue.enqueue(7).is_ok());

        let mut buf = [0u8; 8];
        assert_eq!(rx.get(&mut buf), None);
        assert!(!rx.is_empty());

        assert!(tx.queue.enqueue(8).is_ok());
        assert!(tx.queue.enqueue(9).is_ok());
        assert_eq!(rx.get(&mut buf), Some(3));
        assert_eq!(&buf[..3], &[7, 8, 9]);
        assert!(rx.is_empty());
    }

    #[test]
    fn wraps_around_the_end() {
        let (mut tx, mut rx) = RingBuffer::new().split();
        let mut buf = [0u8; 128];
        for round in 0..50u8 {
            let frame = [round; 100];
            assert!(tx.put(&frame));
            assert_eq!(rx.get(&mut buf), Some(100));
            assert!(buf[..100].iter().all(|&b| b == round));
        }
    }

    #[test]
    fn producer_and_consumer_on_separate_threads() {
        let (mut tx, mut rx) = RingBuffer::new().split();
        let writer = thread::spawn(move || {
            let mut n: u16 = 0;
            while n < 2000 {
                if tx.put(&n.to_le_bytes()) {
                    n += 1;
                } else {
                    thread::yield_now();
                }
            }
        });

        let mut expected: u16 = 0;
        let mut buf = [0u8; 4];
        while expected < 2000 {
            match rx.get(&mut buf) {
                Some(2) => {
                    assert_eq!(u16::from_le_bytes([buf[0], buf[1]]), expected);
                    expected += 1;
                }
                Some(n) => panic!("unexpected frame length {}", n),
                None => thread::yield_now(),
            }
        }
        writer.join().unwrap();
    }

    proptest! {
        #[test]
        fn prop_fifo_within_capacity(frames in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..60), 0..15)) {
            let (mut tx, mut rx) = RingBuffer::new().split();
            for frame in &frames {
                prop_assert!(tx.put(frame));
            }
            let mut buf = [0u8; 64];
            for frame in &frames {
                let n = rx.get(&mut buf);
                prop_assert_eq!(n, Some(frame.len()));
                prop_assert_eq!(&buf[..frame.len()], frame.as_slice());
            }
            prop_assert_eq!(rx.get(&mut buf), None);
        }
    }
}
