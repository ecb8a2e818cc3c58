use std::collections::VecDeque;

use tokio::sync::watch;
use web_async::Lock;

use crate::{Error, GroupOrder};

/// An unbounded work queue shared between an accept loop and its consumer.
///
/// A capacity-1 watch channel coalesces wake-ups; pushing twice before the
/// consumer runs results in a single notification.
pub struct Queue<T> {
	state: Lock<State<T>>,
	notify: watch::Sender<()>,
}

struct State<T> {
	items: VecDeque<T>,
	closed: Option<Error>,
}

impl<T> Clone for Queue<T> {
	fn clone(&self) -> Self {
		Self {
			state: self.state.clone(),
			notify: self.notify.clone(),
		}
	}
}

impl<T> Default for Queue<T> {
	fn default() -> Self {
		Self {
			state: Lock::new(State {
				items: VecDeque::new(),
				closed: None,
			}),
			notify: watch::Sender::new(()),
		}
	}
}

impl<T> Queue<T> {
	/// Append an item, failing if the queue was closed.
	pub fn push(&self, item: T) -> Result<(), Error> {
		{
			let mut state = self.state.lock();
			if let Some(err) = &state.closed {
				return Err(err.clone());
			}
			state.items.push_back(item);
		}
		self.notify.send_replace(());
		Ok(())
	}

	/// Remove the oldest item, suspending until one is available.
	///
	/// Items pushed before [Self::close] drain first; afterwards the close cause is returned.
	pub async fn pop(&self) -> Result<T, Error> {
		let mut changed = self.notify.subscribe();

		loop {
			{
				let mut state = self.state.lock();
				if let Some(item) = state.items.pop_front() {
					return Ok(item);
				}
				if let Some(err) = &state.closed {
					return Err(err.clone());
				}
			}

			// The sender lives in self, so this cannot fail.
			let _ = changed.changed().await;
		}
	}

	/// Close the queue with a cause, returning any items still inside.
	///
	/// The caller is responsible for closing each returned item with the same cause.
	pub fn close(&self, err: Error) -> Vec<T> {
		let drained = {
			let mut state = self.state.lock();
			if state.closed.is_none() {
				state.closed = Some(err);
			}
			state.items.drain(..).collect()
		};
		self.notify.send_replace(());
		drained
	}
}

/// A queue of pending groups, popped according to the negotiated [GroupOrder].
///
/// - [GroupOrder::Default]: arrival order (the publisher's choice).
/// - [GroupOrder::Ascending]: the lowest pending sequence first.
/// - [GroupOrder::Descending]: the highest pending sequence first.
pub struct OrderedQueue<T> {
	state: Lock<OrderedState<T>>,
	notify: watch::Sender<()>,
	order: GroupOrder,
}

struct OrderedState<T> {
	items: VecDeque<(u64, T)>,
	closed: Option<Error>,
}

impl<T> Clone for OrderedQueue<T> {
	fn clone(&self) -> Self {
		Self {
			state: self.state.clone(),
			notify: self.notify.clone(),
			order: self.order,
		}
	}
}

impl<T> OrderedQueue<T> {
	pub fn new(order: GroupOrder) -> Self {
		Self {
			state: Lock::new(OrderedState {
				items: VecDeque::new(),
				closed: None,
			}),
			notify: watch::Sender::new(()),
			order,
		}
	}

	pub fn push(&self, sequence: u64, item: T) -> Result<(), Error> {
		{
			let mut state = self.state.lock();
			if let Some(err) = &state.closed {
				return Err(err.clone());
			}
			state.items.push_back((sequence, item));
		}
		self.notify.send_replace(());
		Ok(())
	}

	pub async fn pop(&self) -> Result<(u64, T), Error> {
		let mut changed = self.notify.subscribe();

		loop {
			{
				let mut state = self.state.lock();
				if !state.items.is_empty() {
					let index = match self.order {
						GroupOrder::Default => 0,
						GroupOrder::Ascending => {
							let (index, _) = state
								.items
								.iter()
								.enumerate()
								.min_by_key(|(_, (seq, _))| *seq)
								.expect("not empty");
							index
						}
						GroupOrder::Descending => {
							let (index, _) = state
								.items
								.iter()
								.enumerate()
								.max_by_key(|(_, (seq, _))| *seq)
								.expect("not empty");
							index
						}
					};
					return Ok(state.items.remove(index).expect("valid index"));
				}
				if let Some(err) = &state.closed {
					return Err(err.clone());
				}
			}

			let _ = changed.changed().await;
		}
	}

	pub fn close(&self, err: Error) -> Vec<(u64, T)> {
		let drained = {
			let mut state = self.state.lock();
			if state.closed.is_none() {
				state.closed = Some(err);
			}
			state.items.drain(..).collect()
		};
		self.notify.send_replace(());
		drained
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::GroupCode;

	#[tokio::test]
	async fn fifo_until_closed() {
		let queue = Queue::default();
		queue.push(1).unwrap();
		queue.push(2).unwrap();

		assert_eq!(queue.pop().await.unwrap(), 1);
		assert_eq!(queue.pop().await.unwrap(), 2);

		let drained = queue.close(Error::Cancel);
		assert!(drained.is_empty());
		assert!(matches!(queue.pop().await, Err(Error::Cancel)));
		assert!(queue.push(3).is_err());
	}

	#[tokio::test]
	async fn close_drains_remaining() {
		let queue = Queue::default();
		queue.push("a").unwrap();
		queue.push("b").unwrap();

		let drained = queue.close(Error::Group(GroupCode::InternalError));
		assert_eq!(drained, vec!["a", "b"]);
	}

	#[tokio::test]
	async fn pop_wakes_on_push() {
		let queue = Queue::default();
		let waiter = {
			let queue = queue.clone();
			tokio::spawn(async move { queue.pop().await })
		};

		tokio::task::yield_now().await;
		queue.push(7).unwrap();

		assert_eq!(waiter.await.unwrap().unwrap(), 7);
	}

	#[tokio::test]
	async fn ordered_pop_respects_order() {
		let ascending = OrderedQueue::new(GroupOrder::Ascending);
		ascending.push(5, "e").unwrap();
		ascending.push(2, "b").unwrap();
		ascending.push(9, "i").unwrap();
		assert_eq!(ascending.pop().await.unwrap(), (2, "b"));
		assert_eq!(ascending.pop().await.unwrap(), (5, "e"));

		let descending = OrderedQueue::new(GroupOrder::Descending);
		descending.push(5, "e").unwrap();
		descending.push(2, "b").unwrap();
		descending.push(9, "i").unwrap();
		assert_eq!(descending.pop().await.unwrap(), (9, "i"));

		let arrival = OrderedQueue::new(GroupOrder::Default);
		arrival.push(5, "e").unwrap();
		arrival.push(2, "b").unwrap();
		assert_eq!(arrival.pop().await.unwrap(), (5, "e"));
	}
}
