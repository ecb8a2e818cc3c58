use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use web_async::Lock;

use crate::coding::{DecodeError, Stream};
use crate::message::{self, AnnouncePlease, Fetch, FetchUpdate, InfoRequest, Subscribe, SubscribeOk, SubscribeUpdate};
use crate::session::track::{SubscriptionState, TrackWriter};
use crate::transport::Transport;
use crate::{
	AnnounceCode, AnnouncedEvent, BroadcastPath, Context, Error, GroupOrder, GroupSequence, Info, Pattern,
	SequenceWindow, SubscribeCode, TerminateCode, TrackMux,
};

/// The publisher half of a session: incoming subscribe, fetch, announce and
/// info streams, dispatched through the session's [TrackMux].
#[derive(Clone)]
pub(crate) struct Publisher {
	transport: Arc<dyn Transport>,
	context: Context,
	mux: TrackMux,
	// Incoming subscribe IDs currently in use; duplicates are rejected.
	subscribed: Lock<HashSet<u64>>,
	// Announce prefixes currently served; duplicate interest is rejected.
	interests: Lock<HashSet<String>>,
	// Live per-track state, keyed per subscribe ID; consulted by info requests.
	tracks: Lock<HashMap<(BroadcastPath, String), HashMap<u64, Lock<SubscriptionState>>>>,
}

impl Publisher {
	pub fn new(transport: Arc<dyn Transport>, context: Context, mux: TrackMux) -> Self {
		Self {
			transport,
			context,
			mux,
			subscribed: Lock::new(HashSet::new()),
			interests: Lock::new(HashSet::new()),
			tracks: Lock::new(HashMap::new()),
		}
	}

	pub async fn serve_subscribe(&self, stream: Stream) {
		let Stream { mut writer, mut reader } = stream;

		let msg: Subscribe = match reader.message().await {
			Ok(msg) => msg,
			Err(err) => {
				writer.abort(&err);
				reader.stop(&err);
				return;
			}
		};

		let id = msg.subscribe_id;
		tracing::debug!(id, path = %msg.broadcast_path, track = %msg.track_name, "serving subscribe");

		if !self.subscribed.lock().insert(id) {
			let err = Error::Subscribe(SubscribeCode::DuplicateId);
			writer.abort(&err);
			reader.stop(&err);
			return;
		}

		let handler = match self.mux.handler(&msg.broadcast_path) {
			Some(handler) => handler,
			None => {
				self.subscribed.lock().remove(&id);
				let err = Error::Subscribe(SubscribeCode::TrackDoesNotExist);
				writer.abort(&err);
				reader.stop(&err);
				return;
			}
		};

		let info = Info {
			priority: msg.priority,
			order: msg.order,
			latest: GroupSequence::UNSPECIFIED,
		};

		let ok = SubscribeOk {
			priority: info.priority,
			order: info.order,
			latest_sequence: info.latest,
		};
		if let Err(err) = writer.message(&ok).await {
			self.subscribed.lock().remove(&id);
			writer.abort(&err);
			reader.stop(&err);
			return;
		}

		let window = SequenceWindow::new(msg.min_sequence, msg.max_sequence);
		let state = SubscriptionState::new(window, info);
		let key = (msg.broadcast_path.clone(), msg.track_name.clone());
		self.tracks.lock().entry(key.clone()).or_default().insert(id, state.clone());

		let context = self.context.child();
		let track = TrackWriter::new(
			context.clone(),
			self.transport.clone(),
			id,
			msg.broadcast_path,
			msg.track_name,
			state.clone(),
			writer,
		);
		web_async::spawn(handler.serve_track(track));

		// Drive the subscriber's update channel until the subscription ends.
		loop {
			let update = tokio::select! {
				res = reader.message_maybe::<SubscribeUpdate>() => res,
				_ = context.done() => break,
			};

			match update {
				Ok(Some(update)) => {
					let narrowed = {
						let mut state = state.lock();
						let result = state.narrow(update.min_sequence, update.max_sequence);
						if result.is_ok() {
							state.info.priority = update.priority;
						}
						result
					};

					// Widening the window is a protocol violation on this stream.
					if narrowed.is_err() {
						let err = Error::Session(TerminateCode::ProtocolViolation);
						reader.stop(&err);
						context.cancel(err);
						break;
					}
				}
				// Clean EOF: the subscriber unsubscribed.
				Ok(None) => {
					context.cancel(Error::Cancel);
					break;
				}
				Err(err) => {
					context.cancel(err);
					break;
				}
			}
		}

		self.subscribed.lock().remove(&id);
		{
			let mut tracks = self.tracks.lock();
			if let Some(states) = tracks.get_mut(&key) {
				states.remove(&id);
				if states.is_empty() {
					tracks.remove(&key);
				}
			}
		}
		tracing::debug!(id, "subscribe done");
	}

	pub async fn serve_fetch(&self, stream: Stream) {
		let Stream { mut writer, mut reader } = stream;

		let msg: Fetch = match reader.message().await {
			Ok(msg) => msg,
			Err(err) => {
				writer.abort(&err);
				reader.stop(&err);
				return;
			}
		};

		let id = msg.subscribe_id;
		tracing::debug!(id, path = %msg.broadcast_path, track = %msg.track_name, sequence = %msg.sequence, "serving fetch");

		if !self.subscribed.lock().insert(id) {
			let err = Error::Subscribe(SubscribeCode::DuplicateId);
			writer.abort(&err);
			reader.stop(&err);
			return;
		}

		let handler = match self.mux.handler(&msg.broadcast_path) {
			Some(handler) => handler,
			None => {
				self.subscribed.lock().remove(&id);
				let err = Error::Subscribe(SubscribeCode::TrackDoesNotExist);
				writer.abort(&err);
				reader.stop(&err);
				return;
			}
		};

		let info = Info {
			priority: msg.priority,
			order: GroupOrder::Default,
			latest: msg.sequence,
		};

		let ok = SubscribeOk {
			priority: info.priority,
			order: info.order,
			latest_sequence: info.latest,
		};
		if let Err(err) = writer.message(&ok).await {
			self.subscribed.lock().remove(&id);
			writer.abort(&err);
			reader.stop(&err);
			return;
		}

		// A fetch is pinned to one group; the window never moves.
		let window = SequenceWindow::new(msg.sequence, msg.sequence);
		let state = SubscriptionState::new(window, info);

		let context = self.context.child();
		let track = TrackWriter::new(
			context.clone(),
			self.transport.clone(),
			id,
			msg.broadcast_path,
			msg.track_name,
			state.clone(),
			writer,
		);
		web_async::spawn(handler.serve_track(track));

		// Only reprioritization is allowed on a fetch.
		loop {
			let update = tokio::select! {
				res = reader.message_maybe::<FetchUpdate>() => res,
				_ = context.done() => break,
			};

			match update {
				Ok(Some(update)) => {
					state.lock().info.priority = update.priority;
				}
				Ok(None) => {
					context.cancel(Error::Cancel);
					break;
				}
				Err(err) => {
					context.cancel(err);
					break;
				}
			}
		}

		self.subscribed.lock().remove(&id);
		tracing::debug!(id, "fetch done");
	}

	pub async fn serve_announce(&self, stream: Stream) {
		let Stream { mut writer, mut reader } = stream;

		let msg: AnnouncePlease = match reader.message().await {
			Ok(msg) => msg,
			Err(err) => {
				writer.abort(&err);
				reader.stop(&err);
				return;
			}
		};

		if !msg.prefix.starts_with('/') {
			let err = Error::Decode(DecodeError::InvalidPath);
			writer.abort(&err);
			reader.stop(&err);
			return;
		}

		if !self.interests.lock().insert(msg.prefix.clone()) {
			let err = Error::Announce(AnnounceCode::DuplicatedInterest);
			writer.abort(&err);
			reader.stop(&err);
			return;
		}

		tracing::debug!(prefix = %msg.prefix, "serving announcements");

		let pattern = Pattern::new(msg.prefix.clone());
		let literal = pattern.prefix();
		let feed = self.mux.announced(pattern);

		loop {
			let event = tokio::select! {
				event = feed.next() => event,
				// The subscriber hanging up ends the interest.
				_ = reader.closed() => break,
				_ = self.context.done() => break,
			};

			let announce = match event {
				Some(AnnouncedEvent::Active(path)) => message::Announce {
					status: message::AnnounceStatus::Active,
					suffix: suffix(&literal, &path),
					parameters: Default::default(),
				},
				Some(AnnouncedEvent::Ended(path)) => message::Announce {
					status: message::AnnounceStatus::Ended,
					suffix: suffix(&literal, &path),
					parameters: Default::default(),
				},
				Some(AnnouncedEvent::Live) => message::Announce::live(),
				// The feed closed us out as a slow consumer.
				None => {
					writer.abort(&Error::Announce(AnnounceCode::InternalError));
					break;
				}
			};

			if writer.message(&announce).await.is_err() {
				break;
			}
		}

		self.interests.lock().remove(&msg.prefix);
	}

	pub async fn serve_info(&self, stream: Stream) {
		let Stream { mut writer, mut reader } = stream;

		let msg: InfoRequest = match reader.message().await {
			Ok(msg) => msg,
			Err(err) => {
				writer.abort(&err);
				reader.stop(&err);
				return;
			}
		};

		if self.mux.handler(&msg.broadcast_path).is_none() {
			let err = Error::Subscribe(SubscribeCode::TrackDoesNotExist);
			writer.abort(&err);
			reader.stop(&err);
			return;
		}

		// Live subscriptions know the latest sequence; otherwise defaults.
		let info = self
			.tracks
			.lock()
			.get(&(msg.broadcast_path, msg.track_name))
			.and_then(|states| states.values().map(|state| state.lock().info).max_by_key(|info| info.latest))
			.unwrap_or_default();

		if writer.message(&message::Info::from(info)).await.is_ok() {
			let _ = writer.finish();
		}
	}
}

/// The wire suffix of a path relative to the interest's literal prefix.
fn suffix(literal: &str, path: &BroadcastPath) -> String {
	if path.as_str() == literal {
		return String::new();
	}
	path.strip_prefix(literal).unwrap_or(path.as_str()).to_string()
}
