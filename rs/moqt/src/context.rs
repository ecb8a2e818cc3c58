use std::sync::Arc;

use tokio::sync::watch;
use web_async::Lock;

use crate::Error;

/// A hierarchical cancellation context with a typed cause.
///
/// Contexts form a strict tree: connection > session > track > group.
/// Cancelling a node cancels all descendants with the same cause.
/// Cancellation is idempotent; the first cause wins.
#[derive(Clone)]
pub struct Context {
	inner: Arc<Inner>,
}

struct Inner {
	parent: Option<Context>,
	done: watch::Sender<bool>,
	cause: Lock<Option<Error>>,
}

impl Context {
	/// Create a root context.
	pub fn new() -> Self {
		Self {
			inner: Arc::new(Inner {
				parent: None,
				done: watch::Sender::new(false),
				cause: Lock::new(None),
			}),
		}
	}

	/// Create a child context, cancelled whenever this context is cancelled.
	pub fn child(&self) -> Self {
		Self {
			inner: Arc::new(Inner {
				parent: Some(self.clone()),
				done: watch::Sender::new(false),
				cause: Lock::new(None),
			}),
		}
	}

	/// Cancel this context (and every descendant) with the given cause.
	pub fn cancel(&self, cause: Error) {
		{
			let mut slot = self.inner.cause.lock();
			if slot.is_some() {
				return;
			}
			*slot = Some(cause);
		}
		self.inner.done.send_replace(true);
	}

	/// Returns true once this context or any ancestor was cancelled.
	pub fn is_done(&self) -> bool {
		if *self.inner.done.borrow() {
			return true;
		}
		match &self.inner.parent {
			Some(parent) => parent.is_done(),
			None => false,
		}
	}

	/// The cause of cancellation, inherited from the nearest cancelled ancestor.
	pub fn cause(&self) -> Option<Error> {
		if let Some(cause) = self.inner.cause.lock().clone() {
			return Some(cause);
		}
		match &self.inner.parent {
			Some(parent) => parent.cause(),
			None => None,
		}
	}

	/// Suspend until this context or any ancestor is cancelled.
	pub async fn done(&self) {
		// The chain is short (connection > session > track > group), so polling
		// every ancestor's channel is cheap.
		let mut watchers = Vec::new();
		let mut node = Some(self.clone());
		while let Some(ctx) = node {
			watchers.push(ctx.inner.done.subscribe());
			node = ctx.inner.parent.clone();
		}

		loop {
			if watchers.iter().any(|rx| *rx.borrow()) {
				return;
			}

			let changed = watchers.iter_mut().map(|rx| Box::pin(rx.changed()));
			let _ = futures::future::select_all(changed).await;
		}
	}
}

impl Default for Context {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::TerminateCode;

	#[tokio::test]
	async fn cancel_cascades_to_children() {
		let root = Context::new();
		let track = root.child();
		let group = track.child();

		assert!(!group.is_done());

		root.cancel(Error::Session(TerminateCode::NoError));
		group.done().await;

		assert!(track.is_done());
		assert!(matches!(group.cause(), Some(Error::Session(TerminateCode::NoError))));
	}

	#[tokio::test]
	async fn cancel_is_idempotent() {
		let ctx = Context::new();
		ctx.cancel(Error::Cancel);
		ctx.cancel(Error::ClosedSessionStream);

		// The first cause wins.
		assert!(matches!(ctx.cause(), Some(Error::Cancel)));
	}

	#[tokio::test]
	async fn child_cancel_does_not_affect_parent() {
		let root = Context::new();
		let child = root.child();

		child.cancel(Error::Cancel);
		child.done().await;

		assert!(!root.is_done());
		assert!(root.cause().is_none());
	}

	#[tokio::test]
	async fn done_wakes_pending_waiter() {
		let ctx = Context::new();
		let child = ctx.child();

		let waiter = tokio::spawn(async move {
			child.done().await;
			child.cause()
		});

		tokio::task::yield_now().await;
		ctx.cancel(Error::ClosedSessionStream);

		let cause = waiter.await.unwrap();
		assert!(matches!(cause, Some(Error::ClosedSessionStream)));
	}
}
