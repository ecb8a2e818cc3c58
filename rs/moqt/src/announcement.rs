use std::collections::HashMap;
use std::sync::Arc;

use web_async::Lock;

use crate::{BroadcastPath, Context, Error};

/// A live declaration that a broadcast path is currently served.
///
/// Cloning is cheap; all clones refer to the same announcement. Ending is
/// idempotent: callbacks fire exactly once and the context becomes done.
#[derive(Clone)]
pub struct Announcement {
	inner: Arc<Inner>,
}

struct Inner {
	path: BroadcastPath,
	context: Context,
	state: Lock<State>,
}

struct State {
	active: bool,
	next_id: u64,
	callbacks: HashMap<u64, Box<dyn FnOnce() + Send>>,
}

/// A token for a registered after-end callback; see [Announcement::on_end].
pub struct EndHandle {
	id: u64,
	state: Lock<State>,
}

impl EndHandle {
	/// Deregister the callback without running it.
	pub fn stop(self) {
		self.state.lock().callbacks.remove(&self.id);
	}
}

impl Announcement {
	pub fn new(path: BroadcastPath) -> Self {
		Self {
			inner: Arc::new(Inner {
				path,
				context: Context::new(),
				state: Lock::new(State {
					active: true,
					next_id: 0,
					callbacks: HashMap::new(),
				}),
			}),
		}
	}

	pub fn path(&self) -> &BroadcastPath {
		&self.inner.path
	}

	pub fn is_active(&self) -> bool {
		self.inner.state.lock().active
	}

	/// A context that becomes done when the announcement ends.
	pub fn context(&self) -> &Context {
		&self.inner.context
	}

	/// Register a callback to run when the announcement ends.
	///
	/// If the announcement has already ended, the callback runs immediately.
	pub fn on_end<F: FnOnce() + Send + 'static>(&self, callback: F) -> EndHandle {
		let id = {
			let mut state = self.inner.state.lock();
			if !state.active {
				drop(state);
				callback();
				// Already fired; stop() has nothing left to remove.
				return EndHandle {
					id: u64::MAX,
					state: self.inner.state.clone(),
				};
			}

			let id = state.next_id;
			state.next_id += 1;
			state.callbacks.insert(id, Box::new(callback));
			id
		};

		EndHandle {
			id,
			state: self.inner.state.clone(),
		}
	}

	/// End the announcement, firing every registered callback exactly once.
	pub fn end(&self) {
		let callbacks: Vec<_> = {
			let mut state = self.inner.state.lock();
			if !state.active {
				return;
			}
			state.active = false;
			state.callbacks.drain().map(|(_, f)| f).collect()
		};

		for callback in callbacks {
			callback();
		}

		self.inner.context.cancel(Error::Cancel);
	}
}

impl std::fmt::Debug for Announcement {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Announcement")
			.field("path", &self.inner.path)
			.field("active", &self.is_active())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicUsize, Ordering};

	#[tokio::test]
	async fn end_fires_callbacks_once() {
		let announcement = Announcement::new(BroadcastPath::new("/a/b"));
		let fired = Arc::new(AtomicUsize::new(0));

		let count = fired.clone();
		announcement.on_end(move || {
			count.fetch_add(1, Ordering::SeqCst);
		});

		assert!(announcement.is_active());
		announcement.end();
		announcement.end();

		assert_eq!(fired.load(Ordering::SeqCst), 1);
		assert!(!announcement.is_active());
		announcement.context().done().await;
	}

	#[test]
	fn stopped_callback_does_not_fire() {
		let announcement = Announcement::new(BroadcastPath::new("/a"));
		let fired = Arc::new(AtomicUsize::new(0));

		let count = fired.clone();
		let handle = announcement.on_end(move || {
			count.fetch_add(1, Ordering::SeqCst);
		});
		handle.stop();

		announcement.end();
		assert_eq!(fired.load(Ordering::SeqCst), 0);
	}

	#[test]
	fn late_registration_fires_immediately() {
		let announcement = Announcement::new(BroadcastPath::new("/a"));
		announcement.end();

		let fired = Arc::new(AtomicUsize::new(0));
		let count = fired.clone();
		announcement.on_end(move || {
			count.fetch_add(1, Ordering::SeqCst);
		});

		assert_eq!(fired.load(Ordering::SeqCst), 1);
	}
}
