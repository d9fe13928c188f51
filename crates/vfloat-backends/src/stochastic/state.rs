//! Per-thread instrumentation state.
//!
//! While a thread is `Native` every rounding mode behaves as nearest. The
//! instrumented program toggles the state with user calls 6 and 7; the
//! engine itself enters a [`NativeSection`] while it evaluates correction
//! terms.

use std::cell::Cell;
use std::marker::PhantomData;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentationState {
    Instrumented,
    Native,
}

thread_local! {
    static STATE: Cell<InstrumentationState> = const { Cell::new(InstrumentationState::Instrumented) };
}

#[inline]
pub fn current() -> InstrumentationState {
    STATE.with(Cell::get)
}

pub fn begin_instrumentation() {
    STATE.with(|s| s.set(InstrumentationState::Instrumented));
}

pub fn end_instrumentation() {
    STATE.with(|s| s.set(InstrumentationState::Native));
}

/// Restores the previous state on drop. Not `Send`: it belongs to the
/// thread that created it.
#[must_use = "the section ends when the guard is dropped"]
pub struct NativeSection {
    previous: InstrumentationState,
    _not_send: PhantomData<*const ()>,
}

#[inline]
pub fn native_section() -> NativeSection {
    let previous = STATE.with(|s| s.replace(InstrumentationState::Native));
    NativeSection {
        previous,
        _not_send: PhantomData,
    }
}

impl Drop for NativeSection {
    fn drop(&mut self) {
        let previous = self.previous;
        STATE.with(|s| s.set(previous));
    }
}
