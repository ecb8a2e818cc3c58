use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use web_async::Lock;

use crate::coding::{Reader, Stream};
use crate::message::{Fetch, GroupHeader, StreamType, Subscribe, SubscribeOk, SubscribeUpdate};
use crate::session::track::{SubscriptionState, TrackReader};
use crate::session::GroupReader;
use crate::transport::Transport;
use crate::{
	BroadcastPath, Context, Error, GroupCode, GroupOrder, GroupSequence, Info, OrderedQueue, SequenceWindow,
	TerminateCode, TrackConfig, TrackPriority,
};

/// The subscriber half of a session: outgoing subscriptions and incoming groups.
#[derive(Clone)]
pub(crate) struct Subscriber {
	transport: Arc<dyn Transport>,
	context: Context,
	next_id: Arc<AtomicU64>,
	subscriptions: Lock<HashMap<u64, Subscription>>,
}

#[derive(Clone)]
struct Subscription {
	context: Context,
	state: Lock<SubscriptionState>,
	groups: OrderedQueue<GroupReader>,
}

impl Subscriber {
	pub fn new(transport: Arc<dyn Transport>, context: Context) -> Self {
		Self {
			transport,
			context,
			next_id: Arc::new(AtomicU64::new(0)),
			subscriptions: Lock::new(HashMap::new()),
		}
	}

	pub async fn subscribe(&self, path: BroadcastPath, name: &str, config: TrackConfig) -> Result<TrackReader, Error> {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		let mut stream = Stream::open(&self.transport).await?;

		let result = async {
			stream.writer.encode(&StreamType::Subscribe).await?;
			stream
				.writer
				.message(&Subscribe {
					subscribe_id: id,
					broadcast_path: path.clone(),
					track_name: name.to_string(),
					priority: config.priority,
					order: config.order,
					min_sequence: config.min_sequence,
					max_sequence: config.max_sequence,
					parameters: Default::default(),
				})
				.await?;
			stream.reader.message::<SubscribeOk>().await
		}
		.await;

		let ok = match result {
			Ok(ok) => ok,
			Err(err) => {
				stream.abort(&err);
				return Err(err);
			}
		};

		tracing::debug!(id, %path, track = name, "subscribed");

		let window = SequenceWindow::new(config.min_sequence, config.max_sequence);
		let info = Info {
			priority: ok.priority,
			order: ok.order,
			latest: ok.latest_sequence,
		};

		Ok(self.register(id, path, name, window, info, ok.order, stream, false))
	}

	/// One-shot variant: fetch a single group, with no update channel.
	pub async fn fetch(
		&self,
		path: BroadcastPath,
		name: &str,
		priority: TrackPriority,
		sequence: GroupSequence,
	) -> Result<TrackReader, Error> {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		let mut stream = Stream::open(&self.transport).await?;

		let result = async {
			stream.writer.encode(&StreamType::Fetch).await?;
			stream
				.writer
				.message(&Fetch {
					subscribe_id: id,
					broadcast_path: path.clone(),
					track_name: name.to_string(),
					priority,
					sequence,
					parameters: Default::default(),
				})
				.await?;
			stream.reader.message::<SubscribeOk>().await
		}
		.await;

		let ok = match result {
			Ok(ok) => ok,
			Err(err) => {
				stream.abort(&err);
				return Err(err);
			}
		};

		tracing::debug!(id, %path, track = name, %sequence, "fetching");

		let window = SequenceWindow::new(sequence, sequence);
		let info = Info {
			priority: ok.priority,
			order: ok.order,
			latest: ok.latest_sequence,
		};

		Ok(self.register(id, path, name, window, info, GroupOrder::Default, stream, true))
	}

	#[allow(clippy::too_many_arguments)]
	fn register(
		&self,
		id: u64,
		path: BroadcastPath,
		name: &str,
		window: SequenceWindow,
		info: Info,
		order: GroupOrder,
		stream: Stream,
		fetch: bool,
	) -> TrackReader {
		let state = SubscriptionState::new(window, info);
		let groups = OrderedQueue::new(order);
		let context = self.context.child();

		self.subscriptions.lock().insert(
			id,
			Subscription {
				context: context.clone(),
				state: state.clone(),
				groups: groups.clone(),
			},
		);

		let Stream { writer, reader } = stream;

		let subscriber = self.clone();
		let control = Subscription {
			context: context.clone(),
			state: state.clone(),
			groups: groups.clone(),
		};
		web_async::spawn(async move {
			subscriber.run_control(id, control, reader).await;
		});

		TrackReader::new(context, path, name.to_string(), state, groups, writer, fetch)
	}

	/// Drive the receive side of one subscribe stream until it ends.
	///
	/// The publisher may narrow the window at any time; a widening update is a
	/// protocol violation on this stream only.
	async fn run_control(&self, id: u64, subscription: Subscription, mut reader: Reader) {
		let cause = loop {
			let update = tokio::select! {
				res = reader.message_maybe::<SubscribeUpdate>() => res,
				_ = subscription.context.done() => break subscription.context.cause().unwrap_or(Error::Cancel),
			};

			match update {
				Ok(Some(update)) => {
					let narrowed = {
						let mut state = subscription.state.lock();
						let result = state.narrow(update.min_sequence, update.max_sequence);
						if result.is_ok() {
							state.info.priority = update.priority;
						}
						result
					};

					if narrowed.is_err() {
						let err = Error::Session(TerminateCode::ProtocolViolation);
						reader.stop(&err);
						break err;
					}
				}
				// Clean EOF: the publisher ended the subscription.
				Ok(None) => break Error::Cancel,
				Err(err) => break err,
			}
		};

		subscription.context.cancel(cause.clone());
		subscription.groups.close(cause);
		self.subscriptions.lock().remove(&id);
		tracing::debug!(id, "subscription ended");
	}

	/// Route an incoming group stream, already past its header, to its subscription.
	pub fn route_group(&self, header: GroupHeader, mut reader: Reader) {
		let subscription = self.subscriptions.lock().get(&header.subscribe_id).cloned();

		let subscription = match subscription {
			Some(subscription) => subscription,
			None => {
				reader.stop(&Error::Group(GroupCode::TrackDoesNotExist));
				return;
			}
		};

		{
			let mut state = subscription.state.lock();
			if !state.window.contains(header.sequence) {
				drop(state);
				reader.stop(&Error::Group(GroupCode::OutOfRange));
				return;
			}
			if !state.seen.insert(header.sequence.0) {
				drop(state);
				reader.stop(&Error::Group(GroupCode::DuplicatedGroup));
				return;
			}
			if header.sequence > state.info.latest {
				state.info.latest = header.sequence;
			}
		}

		let group = GroupReader::new(header.sequence, reader);
		// A failed push means the subscription raced to a close; the stream is dropped.
		let _ = subscription.groups.push(header.sequence.0, group);
	}

	/// Tear down every subscription with the given cause.
	pub fn close(&self, cause: &Error) {
		let subscriptions: Vec<_> = self.subscriptions.lock().drain().map(|(_, s)| s).collect();
		for subscription in subscriptions {
			subscription.context.cancel(cause.clone());
			subscription.groups.close(cause.clone());
		}
	}
}
