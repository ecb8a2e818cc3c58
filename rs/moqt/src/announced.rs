use std::collections::HashMap;

use async_channel::TrySendError;
use web_async::Lock;

use crate::{AnnounceCode, Announcement, BroadcastPath, Error, Pattern};

/// Extra channel capacity beyond the initial snapshot; a consumer that falls
/// this far behind the live feed is closed as a slow consumer.
const FEED_SLACK: usize = 32;

/// One delta of an announcement feed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnnouncedEvent {
	/// The path is now actively served.
	Active(BroadcastPath),
	/// The path is no longer served.
	Ended(BroadcastPath),
	/// The initial snapshot is complete; subsequent events are live deltas.
	Live,
}

/// The consumer half of an announcement feed.
pub struct AnnouncedReader {
	pub(crate) recv: async_channel::Receiver<AnnouncedEvent>,
}

impl AnnouncedReader {
	/// The next event, or None once the feed is closed.
	pub async fn next(&self) -> Option<AnnouncedEvent> {
		self.recv.recv().await.ok()
	}
}

/// A trie over path segments matching active announcements against wildcard interests.
///
/// All mutations happen under a single lock, so every endpoint observes one
/// total order of deltas. Emission is non-blocking; see [FEED_SLACK].
#[derive(Clone, Default)]
pub(crate) struct AnnouncementTree {
	state: Lock<Node>,
}

#[derive(Default)]
struct Node {
	children: HashMap<String, Node>,
	// The announcement whose path terminates at this node, if any.
	announcement: Option<Announcement>,
	// Interests whose pattern's literal prefix terminates at this node.
	endpoints: Vec<Endpoint>,
}

struct Endpoint {
	pattern: Pattern,
	sender: async_channel::Sender<AnnouncedEvent>,
}

impl Node {
	fn is_empty(&self) -> bool {
		self.children.is_empty() && self.announcement.is_none() && self.endpoints.is_empty()
	}

	fn descend(&mut self, segments: &[String]) -> &mut Node {
		match segments.split_first() {
			None => self,
			Some((first, rest)) => self.children.entry(first.clone()).or_default().descend(rest),
		}
	}
}

impl AnnouncementTree {
	/// Insert an active announcement and fan out `Active(path)` to matching interests.
	///
	/// The announcement is removed (with an `Ended(path)` fan-out) when it ends.
	pub fn announce(&self, announcement: Announcement) -> Result<(), Error> {
		let path = announcement.path().clone();
		let segments: Vec<String> = path.segments().map(str::to_string).collect();

		{
			let mut state = self.state.lock();
			let node = state.descend(&segments);
			if node.announcement.as_ref().is_some_and(|a| a.is_active()) {
				return Err(Error::Announce(AnnounceCode::DuplicatedTrackPath));
			}
			node.announcement = Some(announcement.clone());

			fanout(&mut state, &segments, &path, &AnnouncedEvent::Active(path.clone()));
		}

		let tree = self.clone();
		let ended = path.clone();
		announcement.on_end(move || tree.unannounce(&ended));

		Ok(())
	}

	/// Remove an announcement and fan out `Ended(path)`, pruning empty nodes.
	pub fn unannounce(&self, path: &BroadcastPath) {
		let segments: Vec<String> = path.segments().map(str::to_string).collect();
		let mut state = self.state.lock();

		if remove(&mut state, &segments).is_none() {
			return;
		}

		fanout(&mut state, &segments, path, &AnnouncedEvent::Ended(path.clone()));
	}

	/// Register an interest: snapshot of matching active paths, a one-shot
	/// [AnnouncedEvent::Live] marker, then live deltas.
	pub fn subscribe(&self, pattern: Pattern) -> AnnouncedReader {
		let prefix = pattern.prefix();
		let segments: Vec<String> = prefix.split('/').filter(|s| !s.is_empty()).map(str::to_string).collect();

		let mut state = self.state.lock();
		let node = state.descend(&segments);

		let mut snapshot = Vec::new();
		collect(node, &pattern, &mut snapshot);

		let (sender, recv) = async_channel::bounded(snapshot.len() + FEED_SLACK);
		for path in snapshot {
			// Capacity covers the whole snapshot, so this cannot fail.
			let _ = sender.try_send(AnnouncedEvent::Active(path));
		}
		let _ = sender.try_send(AnnouncedEvent::Live);

		node.endpoints.push(Endpoint { pattern, sender });

		AnnouncedReader { recv }
	}

	#[cfg(test)]
	fn endpoint_count(&self) -> usize {
		fn count(node: &Node) -> usize {
			node.endpoints.len() + node.children.values().map(count).sum::<usize>()
		}
		count(&self.state.lock())
	}
}

/// Deliver an event to every matching endpoint on the root-to-terminal walk.
///
/// A full channel means the consumer lost pace with the feed; that endpoint
/// alone is closed. Endpoints whose reader was dropped are discarded.
fn fanout(node: &mut Node, segments: &[String], path: &BroadcastPath, event: &AnnouncedEvent) {
	node.endpoints.retain(|endpoint| {
		if !endpoint.pattern.matches(path) {
			return true;
		}
		match endpoint.sender.try_send(event.clone()) {
			Ok(()) => true,
			Err(TrySendError::Full(_)) => {
				tracing::warn!(pattern = %endpoint.pattern, "dropping slow announcement consumer");
				endpoint.sender.close();
				false
			}
			Err(TrySendError::Closed(_)) => false,
		}
	});

	if let Some((first, rest)) = segments.split_first() {
		if let Some(child) = node.children.get_mut(first) {
			fanout(child, rest, path, event);
		}
	}
}

fn remove(node: &mut Node, segments: &[String]) -> Option<Announcement> {
	match segments.split_first() {
		None => node.announcement.take(),
		Some((first, rest)) => {
			let child = node.children.get_mut(first)?;
			let removed = remove(child, rest);
			if child.is_empty() {
				node.children.remove(first);
			}
			removed
		}
	}
}

fn collect(node: &Node, pattern: &Pattern, out: &mut Vec<BroadcastPath>) {
	if let Some(announcement) = &node.announcement {
		if announcement.is_active() && pattern.matches(announcement.path()) {
			out.push(announcement.path().clone());
		}
	}
	for child in node.children.values() {
		collect(child, pattern, out);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn active(path: &str) -> AnnouncedEvent {
		AnnouncedEvent::Active(BroadcastPath::new(path))
	}

	#[tokio::test]
	async fn snapshot_then_live_then_deltas() {
		let tree = AnnouncementTree::default();
		let b = Announcement::new(BroadcastPath::new("/a/b"));
		let c = Announcement::new(BroadcastPath::new("/a/c"));
		tree.announce(b.clone()).unwrap();
		tree.announce(c).unwrap();

		let reader = tree.subscribe(Pattern::new("/a/**"));

		// Snapshot in either order, each exactly once.
		let mut snapshot = vec![reader.next().await.unwrap(), reader.next().await.unwrap()];
		snapshot.sort_by_key(|e| format!("{:?}", e));
		assert_eq!(snapshot, vec![active("/a/b"), active("/a/c")]);

		assert_eq!(reader.next().await.unwrap(), AnnouncedEvent::Live);

		let d = Announcement::new(BroadcastPath::new("/a/d"));
		tree.announce(d).unwrap();
		assert_eq!(reader.next().await.unwrap(), active("/a/d"));

		b.end();
		assert_eq!(
			reader.next().await.unwrap(),
			AnnouncedEvent::Ended(BroadcastPath::new("/a/b"))
		);
	}

	#[tokio::test]
	async fn pattern_filters_deltas() {
		let tree = AnnouncementTree::default();
		let reader = tree.subscribe(Pattern::new("/room/*/camera"));
		assert_eq!(reader.next().await.unwrap(), AnnouncedEvent::Live);

		tree.announce(Announcement::new(BroadcastPath::new("/room/alice/mic")))
			.unwrap();
		tree.announce(Announcement::new(BroadcastPath::new("/room/alice/camera")))
			.unwrap();

		assert_eq!(reader.next().await.unwrap(), active("/room/alice/camera"));
	}

	#[test]
	fn duplicate_path_rejected() {
		let tree = AnnouncementTree::default();
		tree.announce(Announcement::new(BroadcastPath::new("/a"))).unwrap();

		let result = tree.announce(Announcement::new(BroadcastPath::new("/a")));
		assert!(matches!(result, Err(Error::Announce(AnnounceCode::DuplicatedTrackPath))));
	}

	#[test]
	fn reannounce_after_end() {
		let tree = AnnouncementTree::default();
		let first = Announcement::new(BroadcastPath::new("/a"));
		tree.announce(first.clone()).unwrap();
		first.end();

		tree.announce(Announcement::new(BroadcastPath::new("/a"))).unwrap();
	}

	#[test]
	fn dropped_reader_is_discarded() {
		let tree = AnnouncementTree::default();
		let reader = tree.subscribe(Pattern::new("/a/**"));
		drop(reader);
		assert_eq!(tree.endpoint_count(), 1);

		tree.announce(Announcement::new(BroadcastPath::new("/a/b"))).unwrap();
		assert_eq!(tree.endpoint_count(), 0);
	}
}
