// BufferPool - lock-free buffer pool with dual SPSC queues
//
// Moves PCM from the device callback to the analysis tap without allocating
// or locking on the callback thread.
//
// Architecture:
// - DATA_QUEUE: callback pushes filled buffers, tap consumes
// - POOL_QUEUE: tap returns drained buffers, callback recycles
//
// Buffer flow:
// 1. Callback pops an empty buffer from POOL_QUEUE
// 2. Callback fills it with first-channel samples
// 3. Callback pushes it to DATA_QUEUE
// 4. Tap pops it from DATA_QUEUE and appends the samples to its window
// 5. Tap pushes the buffer back to POOL_QUEUE

use rtrb::{Consumer, Producer};

/// Configuration constants for buffer pool
pub const DEFAULT_BUFFER_COUNT: usize = 16;
pub const DEFAULT_BUFFER_SIZE: usize = 2048;

/// Audio buffer type - pre-allocated vector of f32 samples
pub type AudioBuffer = Vec<f32>;

/// Queue ends owned by the device callback
pub struct CallbackChannels {
    /// Retrieves empty buffers
    pub pool_consumer: Consumer<AudioBuffer>,
    /// Sends filled buffers to the tap
    pub data_producer: Producer<AudioBuffer>,
}

impl CallbackChannels {
    /// Copy one callback's worth of interleaved samples into a pooled buffer
    ///
    /// Only the first channel is kept. Frames beyond the buffer's capacity are
    /// dropped, and so is the whole block when the pool is empty.
    ///
    /// # Returns
    /// `true` if the block was forwarded
    pub fn forward<S, F>(&mut self, data: &[S], channels: usize, to_f32: F) -> bool
    where
        S: Copy,
        F: Fn(S) -> f32,
    {
        let Ok(mut buffer) = self.pool_consumer.pop() else {
            return false;
        };

        buffer.clear();
        let capacity = buffer.capacity();
        for frame in data.chunks(channels.max(1)).take(capacity) {
            buffer.push(frame.first().map(|&s| to_f32(s)).unwrap_or(0.0));
        }
        self.data_producer.push(buffer).is_ok()
    }
}

/// Queue ends owned by the analysis tap
pub struct TapChannels {
    /// Receives filled buffers
    pub data_consumer: Consumer<AudioBuffer>,
    /// Returns drained buffers to the callback
    pub pool_producer: Producer<AudioBuffer>,
}

impl TapChannels {
    /// Drain every pending buffer, handing its samples to `sink`
    ///
    /// # Returns
    /// Number of buffers drained
    pub fn drain<F: FnMut(&[f32])>(&mut self, mut sink: F) -> usize {
        let mut drained = 0;
        while let Ok(buffer) = self.data_consumer.pop() {
            sink(&buffer);
            drained += 1;
            if self.pool_producer.push(buffer).is_err() {
                log::warn!("[BufferPool] Pool queue full, dropping buffer");
            }
        }
        drained
    }
}

/// Lock-free buffer pool using dual SPSC ring buffers
pub struct BufferPool;

impl BufferPool {
    /// Create a new BufferPool with specified buffer count and size
    ///
    /// All allocations happen here so the callback thread stays allocation-free
    /// (the callback only clears and pushes into pre-sized buffers).
    ///
    /// # Panics
    /// Panics if buffer_count is 0 or buffer_size is 0
    #[allow(clippy::new_ret_no_self)]
    pub fn new(buffer_count: usize, buffer_size: usize) -> (CallbackChannels, TapChannels) {
        assert!(buffer_count > 0, "buffer_count must be greater than 0");
        assert!(buffer_size > 0, "buffer_size must be greater than 0");

        let (mut pool_producer, pool_consumer) = rtrb::RingBuffer::new(buffer_count);
        let (data_producer, data_consumer) = rtrb::RingBuffer::new(buffer_count);

        for _ in 0..buffer_count {
            let buffer = Vec::with_capacity(buffer_size);
            if pool_producer.push(buffer).is_err() {
                break;
            }
        }

        (
            CallbackChannels {
                pool_consumer,
                data_producer,
            },
            TapChannels {
                data_consumer,
                pool_producer,
            },
        )
    }
}
