//! Voice-ended notifications from the audio device back to the scheduler.
//!
//! Devices finish voices on their own clock, often on an audio thread.
//! They push the finished handle into a lock-free SPSC ring; the scheduler
//! drains it on its own thread before touching its voice bookkeeping.

use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

/// Device side of the voice-ended queue.
pub struct VoiceEndSender<V> {
    producer: HeapProd<V>,
}

/// Scheduler side of the voice-ended queue.
pub struct VoiceEndReceiver<V> {
    consumer: HeapCons<V>,
}

/// Create a voice-ended queue holding up to `capacity` pending notifications.
pub fn voice_end_channel<V>(capacity: usize) -> (VoiceEndSender<V>, VoiceEndReceiver<V>) {
    let rb = HeapRb::<V>::new(capacity.max(1));
    let (producer, consumer) = rb.split();
    (VoiceEndSender { producer }, VoiceEndReceiver { consumer })
}

impl<V> VoiceEndSender<V> {
    /// Report a finished voice. Returns false if the queue is full.
    pub fn notify(&mut self, voice: V) -> bool {
        if self.producer.try_push(voice).is_err() {
            tracing::warn!("voice-ended queue full, dropping notification");
            return false;
        }
        true
    }
}

impl<V> VoiceEndReceiver<V> {
    /// Pop the next finished voice, if any.
    pub fn try_recv(&mut self) -> Option<V> {
        self.consumer.try_pop()
    }

    /// Hand every pending notification to `f`.
    pub fn drain(&mut self, mut f: impl FnMut(V)) -> usize {
        let mut n = 0;
        while let Some(voice) = self.consumer.try_pop() {
            f(voice);
            n += 1;
        }
        n
    }
}

impl<V> core::fmt::Debug for VoiceEndSender<V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("VoiceEndSender").finish_non_exhaustive()
    }
}

impl<V> core::fmt::Debug for VoiceEndReceiver<V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("VoiceEndReceiver").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notifications_arrive_in_order() {
        let (mut tx, mut rx) = voice_end_channel::<u32>(4);
        assert!(tx.notify(1));
        assert!(tx.notify(2));

        let mut seen = Vec::new();
        assert_eq!(rx.drain(|v| seen.push(v)), 2);
        assert_eq!(seen, vec![1, 2]);
        assert_eq!(rx.try_recv(), None);
    }

    #[test]
    fn full_queue_rejects() {
        let (mut tx, mut rx) = voice_end_channel::<u32>(1);
        assert!(tx.notify(7));
        assert!(!tx.notify(8));
        assert_eq!(rx.try_recv(), Some(7));
    }

    #[test]
    fn sender_crosses_threads() {
        let (mut tx, mut rx) = voice_end_channel::<u32>(16);
        std::thread::spawn(move || {
            for v in 0..8 {
                tx.notify(v);
            }
        })
        .join()
        .unwrap();
        assert_eq!(rx.drain(|_| {}), 8);
    }
}
