//! Reproducible per-thread random streams.
//!
//! A [`RandomSource`] owns a seeding policy. Each thread that draws from it
//! lazily gets its own [`RngState`]: with a fixed seed the stream is seeded
//! with `seed ^ thread_index`, where the index comes from a per-source atomic
//! counter (so streams depend on the order threads first draw, not on OS
//! thread ids). Without a fixed seed the stream mixes wall-clock time, the
//! thread identity and the process id.

mod splitmix;
mod xoroshiro;

pub use splitmix::SplitMix64;
pub use xoroshiro::{to_unit_f64, Xoroshiro128PlusPlus};

use std::cell::RefCell;
use std::collections::hash_map::{DefaultHasher, Entry};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Largest value returned by [`RngState::next_u31`].
pub const RAND_MAX: u32 = (1 << 31) - 1;

/// Number of coin flips served from one 64-bit draw.
const BOOL_RESERVOIR_BITS: u32 = 63;

/// One thread's generator plus the seed that produced it.
#[derive(Clone, Debug)]
pub struct RngState {
    seed: u64,
    generator: Xoroshiro128PlusPlus,
    reservoir: u64,
    reservoir_used: u32,
}

impl RngState {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            seed,
            generator: Xoroshiro128PlusPlus::from_seed(seed),
            reservoir: 0,
            reservoir_used: BOOL_RESERVOIR_BITS,
        }
    }

    /// Seed this stream was last (re)seeded with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Restart the stream from `seed`, discarding cached bits.
    pub fn reseed(&mut self, seed: u64) {
        *self = Self::from_seed(seed);
    }

    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        self.generator.next_u64()
    }

    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        self.generator.next_u32()
    }

    /// Uniform integer in `0..=RAND_MAX` (top 31 bits of a draw).
    #[inline]
    pub fn next_u31(&mut self) -> u32 {
        (self.generator.next_u64() >> 33) as u32
    }

    /// Uniform double in `[0, 1)`.
    #[inline]
    pub fn next_f64(&mut self) -> f64 {
        self.generator.next_f64()
    }

    /// Fair coin, consuming a cached draw one bit at a time.
    #[inline]
    pub fn next_bool(&mut self) -> bool {
        if self.reservoir_used == BOOL_RESERVOIR_BITS {
            self.reservoir = self.generator.next_u64();
            self.reservoir_used = 0;
        }
        let bit = (self.reservoir >> self.reservoir_used) & 1;
        self.reservoir_used += 1;
        bit == 1
    }
}

/// How a [`RandomSource`] seeds each thread's stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeedChoice {
    /// `seed ^ thread_index`; reproducible across runs.
    Fixed(u64),
    /// Time, thread identity and process id.
    Entropy,
}

static NEXT_SOURCE_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static STREAMS: RefCell<HashMap<u64, RngState>> = RefCell::new(HashMap::new());
}

/// Seeding policy shared by all threads, with one lazily created stream per
/// thread.
///
/// Streams live in thread-local storage keyed by the source id. Dropping the
/// source removes the dropping thread's stream; streams on other threads are
/// freed when those threads exit. Ids are never reused, so a stale stream is
/// never picked up by a later source.
#[derive(Debug)]
pub struct RandomSource {
    id: u64,
    choice: SeedChoice,
    thread_counter: AtomicU32,
}

impl RandomSource {
    pub fn new(choice: SeedChoice) -> Self {
        Self {
            id: NEXT_SOURCE_ID.fetch_add(1, Ordering::Relaxed),
            choice,
            thread_counter: AtomicU32::new(0),
        }
    }

    pub fn fixed(seed: u64) -> Self {
        Self::new(SeedChoice::Fixed(seed))
    }

    pub fn entropy() -> Self {
        Self::new(SeedChoice::Entropy)
    }

    pub fn choice(&self) -> SeedChoice {
        self.choice
    }

    /// Number of threads that have drawn from this source so far.
    pub fn threads_seen(&self) -> u32 {
        self.thread_counter.load(Ordering::Relaxed)
    }

    /// Run `f` on the calling thread's stream, creating it on first use.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut RngState) -> R) -> R {
        STREAMS.with(|streams| {
            let mut streams = streams.borrow_mut();
            let state = match streams.entry(self.id) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => entry.insert(RngState::from_seed(self.initial_seed())),
            };
            f(state)
        })
    }

    /// Whether the calling thread has a stream for this source.
    pub fn has_stream_on_current_thread(&self) -> bool {
        STREAMS
            .try_with(|streams| streams.try_borrow().is_ok_and(|streams| streams.contains_key(&self.id)))
            .unwrap_or(false)
    }

    /// Reseed the calling thread's stream with `seed` as given.
    pub fn reseed_current_thread(&self, seed: u64) {
        self.with_state(|state| state.reseed(seed));
    }

    fn initial_seed(&self) -> u64 {
        match self.choice {
            SeedChoice::Fixed(seed) => {
                // Indices start at 1.
                let thread_index = self.thread_counter.fetch_add(1, Ordering::Relaxed) + 1;
                seed ^ u64::from(thread_index)
            }
            SeedChoice::Entropy => {
                self.thread_counter.fetch_add(1, Ordering::Relaxed);
                entropy_seed()
            }
        }
    }
}

impl Drop for RandomSource {
    fn drop(&mut self) {
        // Thread-local storage may already be gone during thread teardown.
        let _ = STREAMS.try_with(|streams| {
            if let Ok(mut streams) = streams.try_borrow_mut() {
                streams.remove(&self.id);
            }
        });
    }
}

fn entropy_seed() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() ^ u64::from(d.subsec_nanos()) << 20)
        .unwrap_or(0);
    let mut hasher = DefaultHasher::new();
    std::thread::current().id().hash(&mut hasher);
    now ^ hasher.finish() ^ u64::from(std::process::id())
}
