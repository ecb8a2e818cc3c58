use std::collections::HashSet;
use std::sync::Arc;

use web_async::Lock;

use crate::coding::Writer;
use crate::message::{GroupHeader, SubscribeUpdate, GROUP_STREAM};
use crate::session::{GroupReader, GroupWriter};
use crate::transport::Transport;
use crate::{
	BroadcastPath, Context, Error, GroupCode, GroupSequence, Info, OrderedQueue, SequenceWindow, SubscribeCode,
	SubscribeDoneCode, TrackConfig,
};

/// The live view of one subscription, shared with the control read loop.
pub(crate) struct SubscriptionState {
	pub window: SequenceWindow,
	pub info: Info,
	// Sequences already delivered; used on the subscriber side to reject duplicates.
	pub seen: HashSet<u64>,
}

impl SubscriptionState {
	pub fn new(window: SequenceWindow, info: Info) -> Lock<Self> {
		Lock::new(Self {
			window,
			info,
			seen: HashSet::new(),
		})
	}

	/// Narrow the window, dropping delivered sequences that fell out of range.
	pub fn narrow(&mut self, min: GroupSequence, max: GroupSequence) -> Result<(), Error> {
		self.window.narrow(min, max)?;

		let window = self.window;
		self.seen.retain(|&sequence| window.contains(GroupSequence(sequence)));
		Ok(())
	}
}

/// The publisher half of an accepted subscription, handed to the track handler.
pub struct TrackWriter {
	context: Context,
	transport: Arc<dyn Transport>,
	subscribe_id: u64,
	path: BroadcastPath,
	name: String,
	state: Lock<SubscriptionState>,
	stream: tokio::sync::Mutex<Option<Writer>>,
}

impl TrackWriter {
	#[allow(clippy::too_many_arguments)]
	pub(crate) fn new(
		context: Context,
		transport: Arc<dyn Transport>,
		subscribe_id: u64,
		path: BroadcastPath,
		name: String,
		state: Lock<SubscriptionState>,
		stream: Writer,
	) -> Self {
		Self {
			context,
			transport,
			subscribe_id,
			path,
			name,
			state,
			stream: tokio::sync::Mutex::new(Some(stream)),
		}
	}

	pub fn path(&self) -> &BroadcastPath {
		&self.path
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// A context that becomes done when the subscription ends.
	pub fn context(&self) -> &Context {
		&self.context
	}

	/// The negotiated priority, order, and latest sequence.
	pub fn info(&self) -> Info {
		self.state.lock().info
	}

	/// Open a new group stream tagged with the given sequence.
	///
	/// The sequence must fall within the subscription's current window; an
	/// out-of-range sequence aborts the fresh stream so the subscriber observes
	/// the reason, then fails here.
	pub async fn open_group(&self, sequence: GroupSequence) -> Result<GroupWriter, Error> {
		if self.context.is_done() {
			return Err(self.context.cause().unwrap_or(Error::Cancel));
		}

		let priority = {
			let mut state = self.state.lock();
			if !state.window.contains(sequence) {
				None
			} else {
				if sequence > state.info.latest {
					state.info.latest = sequence;
				}
				Some(state.info.priority)
			}
		};

		let send = self.transport.open_uni().await?;
		let mut writer = Writer::new(send);

		let priority = match priority {
			Some(priority) => priority,
			None => {
				let err = Error::Group(GroupCode::OutOfRange);
				writer.abort(&err);
				return Err(err);
			}
		};

		writer.set_priority(priority);
		writer.encode(&GROUP_STREAM).await?;
		writer
			.encode(&GroupHeader {
				subscribe_id: self.subscribe_id,
				sequence,
			})
			.await?;

		Ok(GroupWriter::new(self.context.child(), sequence, writer))
	}

	/// End the subscription cleanly; the subscriber observes EOF.
	pub async fn close(&self) -> Result<(), Error> {
		if let Some(mut stream) = self.stream.lock().await.take() {
			stream.finish()?;
		}
		self.context.cancel(Error::Cancel);
		Ok(())
	}

	/// End the subscription with a reason from the done code space.
	pub async fn close_with_error(&self, code: SubscribeDoneCode) {
		let err = Error::SubscribeDone(code);
		if let Some(mut stream) = self.stream.lock().await.take() {
			stream.abort(&err);
		}
		self.context.cancel(err);
	}

	pub(crate) async fn reject(&self, err: Error) {
		if let Some(mut stream) = self.stream.lock().await.take() {
			stream.abort(&err);
		}
		self.context.cancel(err);
	}
}

/// The subscriber half of an accepted subscription.
pub struct TrackReader {
	context: Context,
	path: BroadcastPath,
	name: String,
	state: Lock<SubscriptionState>,
	groups: OrderedQueue<GroupReader>,
	stream: tokio::sync::Mutex<Option<Writer>>,
	// A fetch is one-shot: updates are rejected locally.
	fetch: bool,
}

impl TrackReader {
	pub(crate) fn new(
		context: Context,
		path: BroadcastPath,
		name: String,
		state: Lock<SubscriptionState>,
		groups: OrderedQueue<GroupReader>,
		stream: Writer,
		fetch: bool,
	) -> Self {
		Self {
			context,
			path,
			name,
			state,
			groups,
			stream: tokio::sync::Mutex::new(Some(stream)),
			fetch,
		}
	}

	pub fn path(&self) -> &BroadcastPath {
		&self.path
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn context(&self) -> &Context {
		&self.context
	}

	pub fn info(&self) -> Info {
		self.state.lock().info
	}

	/// Accept the next group, ordered by the negotiated [crate::GroupOrder].
	///
	/// Suspends until a group arrives, the subscription ends, or `ctx` is done.
	pub async fn accept_group(&self, ctx: &Context) -> Result<GroupReader, Error> {
		tokio::select! {
			res = self.groups.pop() => res.map(|(_, group)| group),
			_ = self.context.done() => Err(self.context.cause().unwrap_or(Error::Cancel)),
			_ = ctx.done() => Err(ctx.cause().unwrap_or(Error::Cancel)),
		}
	}

	/// Narrow the subscription; widening either end of the window fails.
	///
	/// The group order is fixed when the subscription is made; a config with a
	/// different order fails with [SubscribeCode::OrderMismatch].
	pub async fn update(&self, config: TrackConfig) -> Result<(), Error> {
		if self.fetch {
			return Err(Error::Subscribe(SubscribeCode::UpdateError));
		}

		{
			let mut state = self.state.lock();
			if config.order != state.info.order {
				return Err(Error::Subscribe(SubscribeCode::OrderMismatch));
			}
			state.narrow(config.min_sequence, config.max_sequence)?;
			state.info.priority = config.priority;
		}

		let msg = SubscribeUpdate {
			priority: config.priority,
			order: config.order,
			min_sequence: config.min_sequence,
			max_sequence: config.max_sequence,
		};

		match self.stream.lock().await.as_mut() {
			Some(stream) => stream.message(&msg).await,
			None => Err(self.context.cause().unwrap_or(Error::Cancel)),
		}
	}

	/// Unsubscribe cleanly.
	pub async fn close(&self) -> Result<(), Error> {
		if let Some(mut stream) = self.stream.lock().await.take() {
			stream.finish()?;
		}
		self.context.cancel(Error::Cancel);
		self.groups.close(Error::Cancel);
		Ok(())
	}

	/// Unsubscribe with a code from the subscribe code space.
	pub async fn close_with_error(&self, code: SubscribeCode) {
		let err = Error::Subscribe(code);
		if let Some(mut stream) = self.stream.lock().await.take() {
			stream.abort(&err);
		}
		self.context.cancel(err.clone());
		self.groups.close(err);
	}
}
