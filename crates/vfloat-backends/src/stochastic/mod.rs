//! Stochastic and directed rounding backend.
//!
//! Each operation is evaluated in hardware round-to-nearest, its exact
//! error is recovered with an error-free transformation, and the configured
//! [`RoundingMode`] decides whether to move the result one ULP.

pub mod mode;
pub mod ops;
pub mod policy;
pub mod state;

use std::ffi::CStr;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, error, info};

use vfloat_abi::{Backend, BackendArgs, BinaryOp, Operation, UserCall};
use vfloat_core::{Float, RandomSource};

use crate::error::{BackendError, Result};
pub use mode::RoundingMode;
use ops::{AddOp, CastOp, DivOp, ExactOp, FmaOp, MulOp, SubOp};
use policy::Draws;
use state::InstrumentationState;

/// Invoked for unrecoverable conditions such as an unimplemented mode.
pub type PanicHook = Box<dyn Fn(&str) + Send + Sync>;

/// Invoked whenever an instrumented result is NaN.
pub type NanHook = Box<dyn Fn() + Send + Sync>;

/// Options accepted by the stochastic backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StochasticConfig {
    pub rounding_mode: RoundingMode,
    /// Fixed global seed; `None` seeds each thread from entropy.
    pub seed: Option<u64>,
}

impl StochasticConfig {
    pub const OPTIONS: &'static [&'static str] = &["rounding-mode", "seed"];

    pub fn from_args(args: &BackendArgs) -> Result<Self> {
        args.reject_unknown(Self::OPTIONS)?;
        let rounding_mode = match args.raw("rounding-mode")? {
            Some(raw) => raw.parse()?,
            None => RoundingMode::default(),
        };
        Ok(Self {
            rounding_mode,
            seed: args.value("seed")?,
        })
    }
}

fn default_panic(message: &str) {
    error!(reason = message, "stochastic backend panic");
    std::process::abort();
}

pub struct StochasticBackend {
    config: StochasticConfig,
    rng: RandomSource,
    saved_seed: AtomicU64,
    panic_hook: RwLock<PanicHook>,
    nan_hook: RwLock<NanHook>,
}

impl StochasticBackend {
    pub fn new(config: StochasticConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => RandomSource::fixed(seed),
            None => RandomSource::entropy(),
        };
        Self {
            config,
            rng,
            saved_seed: AtomicU64::new(0),
            panic_hook: RwLock::new(Box::new(default_panic) as PanicHook),
            nan_hook: RwLock::new(Box::new(|| {}) as NanHook),
        }
    }

    pub fn config(&self) -> &StochasticConfig {
        &self.config
    }

    /// Mode in effect on the calling thread.
    pub fn effective_mode(&self) -> RoundingMode {
        match state::current() {
            InstrumentationState::Instrumented => self.config.rounding_mode,
            InstrumentationState::Native => RoundingMode::Nearest,
        }
    }

    pub fn random_source(&self) -> &RandomSource {
        &self.rng
    }

    /// Replace the panic hook; the default logs and aborts.
    pub fn set_panic_hook(&self, hook: impl Fn(&str) + Send + Sync + 'static) {
        *self.panic_hook.write() = Box::new(hook);
    }

    pub fn set_nan_hook(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.nan_hook.write() = Box::new(hook);
    }

    fn panic(&self, message: &str) {
        (*self.panic_hook.read())(message);
    }

    /// Save a random value from the calling thread's stream, then reseed
    /// the stream with `seed`.
    pub fn set_seed(&self, seed: u64) {
        let saved = self.rng.with_state(|s| s.next_u31());
        self.saved_seed.store(u64::from(saved), Ordering::Relaxed);
        self.rng.reseed_current_thread(seed);
    }

    /// Reseed the calling thread's stream with the value saved by the last
    /// [`set_seed`](Self::set_seed).
    pub fn set_random_seed(&self) {
        self.rng.reseed_current_thread(self.saved_seed.load(Ordering::Relaxed));
    }

    #[inline]
    pub fn round<O: ExactOp>(&self, args: O::Args) -> O::Real {
        let mode = self.effective_mode();
        let res = {
            let _native = state::native_section();
            if mode == RoundingMode::FlushToZero {
                self.panic("FTZ not implemented");
            }
            policy::apply::<O>(mode, args, || self.rng.with_state(|s| Draws::from_state(s, mode)))
        };
        if res.is_nan() {
            (*self.nan_hook.read())();
        }
        res
    }
}

impl Backend for StochasticBackend {
    const NAME: &'static CStr = c"stochastic";
    type Error = BackendError;

    fn configure(args: &BackendArgs) -> Result<Self> {
        let config = StochasticConfig::from_args(args)?;
        info!(mode = %config.rounding_mode, "stochastic rounding mode {}", config.rounding_mode);
        if let Ok(json) = serde_json::to_string(&config) {
            debug!(config = %json, "stochastic backend configured");
        }
        Ok(Self::new(config))
    }

    fn implements(op: Operation) -> bool {
        op != Operation::Cmp
    }

    fn implements_cast() -> bool {
        true
    }

    #[inline]
    fn binary<F: Float>(&self, op: BinaryOp, a: F, b: F) -> F {
        match op {
            BinaryOp::Add => self.round::<AddOp<F>>((a, b)),
            BinaryOp::Sub => self.round::<SubOp<F>>((a, b)),
            BinaryOp::Mul => self.round::<MulOp<F>>((a, b)),
            BinaryOp::Div => self.round::<DivOp<F>>((a, b)),
        }
    }

    #[inline]
    fn fma<F: Float>(&self, a: F, b: F, c: F) -> F {
        self.round::<FmaOp<F>>((a, b, c))
    }

    fn cast_to_f32(&self, a: f64) -> f32 {
        self.round::<CastOp>(a)
    }

    fn user_call(&self, call: UserCall) {
        match call {
            UserCall::BeginInstrumentation => state::begin_instrumentation(),
            UserCall::EndInstrumentation => state::end_instrumentation(),
            UserCall::SetSeed(seed) => self.set_seed(seed),
            UserCall::SetRandomSeed => self.set_random_seed(),
            other => debug!(?other, "stochastic backend ignores user call"),
        }
    }

    fn finalize(&self) {
        debug!(
            mode = %self.config.rounding_mode,
            threads = self.rng.threads_seen(),
            "stochastic backend finalized"
        );
    }
}
