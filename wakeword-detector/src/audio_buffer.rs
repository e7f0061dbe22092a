/// Audio buffer module for assembling scorer frames
///
/// Capture devices and WAV readers hand over chunks of arbitrary length.
/// The scorer wants fixed-size frames, so incoming PCM is staged in a ring
/// buffer and drained one frame at a time. Holds 3 seconds of 16kHz audio
/// by default; when the listener falls behind, the oldest audio is dropped.

use cache_padded::CachePadded;
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::HeapRb;
use thiserror::Error;
use tracing::{trace, warn};

/// Audio sample format (16-bit PCM)
pub type AudioSample = i16;

/// Sample rate expected by the scorer
pub const SAMPLE_RATE: usize = 16000;

/// Default frame size: 80ms at 16kHz
pub const FRAME_SIZE: usize = 1280;

/// Ring buffer size: 3 seconds at 16kHz sample rate
pub const BUFFER_DURATION_SECS: usize = 3;
pub const BUFFER_SIZE: usize = BUFFER_DURATION_SECS * SAMPLE_RATE; // 48,000 samples

#[derive(Error, Debug)]
pub enum AudioBufferError {
    #[error("Invalid buffer size: {0}")]
    InvalidSize(usize),

    #[error("Frame of {frame} samples does not fit in a buffer of {capacity}")]
    FrameTooLarge { frame: usize, capacity: usize },
}

type RingBuffer = HeapRb<AudioSample>;
type RingProducer = <RingBuffer as Split>::Prod;
type RingConsumer = <RingBuffer as Split>::Cons;

/// Ring buffer that turns a PCM stream into fixed-size frames
pub struct AudioBuffer {
    producer: CachePadded<RingProducer>,
    consumer: CachePadded<RingConsumer>,
    frame_size: usize,
    dropped_samples: u64,
}

impl AudioBuffer {
    /// Create a buffer with the default 3-second capacity and 80ms frames
    pub fn new() -> Self {
        Self::build(BUFFER_SIZE, FRAME_SIZE)
    }

    /// Create a buffer for a custom frame size and capacity
    pub fn with_frame_size(frame_size: usize, capacity: usize) -> Result<Self, AudioBufferError> {
        if capacity == 0 {
            return Err(AudioBufferError::InvalidSize(capacity));
        }
        if frame_size == 0 {
            return Err(AudioBufferError::InvalidSize(frame_size));
        }
        if frame_size > capacity {
            return Err(AudioBufferError::FrameTooLarge {
                frame: frame_size,
                capacity,
            });
        }

        Ok(Self::build(capacity, frame_size))
    }

    fn build(capacity: usize, frame_size: usize) -> Self {
        trace!(capacity, frame_size, "Creating audio buffer");

        let rb = RingBuffer::new(capacity);
        let (producer, consumer) = rb.split();

        Self {
            producer: CachePadded::new(producer),
            consumer: CachePadded::new(consumer),
            frame_size,
            dropped_samples: 0,
        }
    }

    /// Append captured samples
    ///
    /// Never blocks. When there is not enough room the oldest samples are
    /// discarded, so the buffer always holds the most recent audio.
    pub fn write(&mut self, samples: &[AudioSample]) -> usize {
        let capacity = self.capacity();

        // Only the newest `capacity` samples can survive anyway
        let samples = if samples.len() > capacity {
            let skipped = samples.len() - capacity;
            self.dropped_samples += skipped as u64;
            &samples[skipped..]
        } else {
            samples
        };

        let vacant = self.producer.vacant_len();
        if samples.len() > vacant {
            let to_drop = samples.len() - vacant;
            let dropped = self.consumer.skip(to_drop);
            self.dropped_samples += dropped as u64;
            warn!(dropped, "Audio buffer full, dropping oldest samples");
        }

        self.producer.push_slice(samples)
    }

    /// Pop the next complete frame, if one is buffered
    pub fn next_frame(&mut self) -> Option<Vec<AudioSample>> {
        if self.consumer.occupied_len() < self.frame_size {
            return None;
        }

        let mut frame = vec![0; self.frame_size];
        let read = self.consumer.pop_slice(&mut frame);
        frame.truncate(read);
        Some(frame)
    }

    /// Number of samples currently buffered
    pub fn len(&self) -> usize {
        self.consumer.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.consumer.capacity().get()
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Total samples discarded because the buffer overflowed
    pub fn dropped_samples(&self) -> u64 {
        self.dropped_samples
    }

    /// Discard everything buffered
    pub fn clear(&mut self) {
        let occupied = self.consumer.occupied_len();
        self.consumer.skip(occupied);
    }

    /// Duration of audio currently buffered (in seconds)
    pub fn duration_secs(&self) -> f32 {
        self.len() as f32 / SAMPLE_RATE as f32
    }
}

impl Default for AudioBuffer {
    fn default() -> Self {
        Self::new()
    }
}
