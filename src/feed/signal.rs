// std
use std::sync::atomic::{AtomicBool, Ordering};
// self
use crate::_prelude::*;

/// Cloneable stop flag checked by a drain between pages.
///
/// Raising the signal never interrupts a page in flight; the drain finishes dispatching the
/// current page, advances the cursor, and returns with `interrupted` set.
#[derive(Clone, Debug, Default)]
pub struct DrainSignal(Arc<AtomicBool>);
impl DrainSignal {
	/// Creates a lowered signal.
	pub fn new() -> Self {
		Self::default()
	}

	/// Asks every drain observing this signal to stop before its next page.
	pub fn raise(&self) {
		self.0.store(true, Ordering::Release);
	}

	/// Lowers the signal so it can be reused.
	pub fn reset(&self) {
		self.0.store(false, Ordering::Release);
	}

	/// Returns `true` once [`raise`](Self::raise) was called.
	pub fn is_raised(&self) -> bool {
		self.0.load(Ordering::Acquire)
	}
}
