use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, OnceLock};

use futures::future::BoxFuture;
use web_async::Lock;

use crate::announced::AnnouncementTree;
use crate::{
	AnnouncedEvent, AnnouncedReader, Announcement, BroadcastPath, Context, Error, Pattern, SubscribeCode, TrackWriter,
};

/// Serves the tracks of a broadcast; one call per accepted subscription.
pub trait TrackHandler: Send + Sync {
	fn serve_track(&self, track: TrackWriter) -> BoxFuture<'static, ()>;
}

impl<H: TrackHandler + ?Sized> TrackHandler for Arc<H> {
	fn serve_track(&self, track: TrackWriter) -> BoxFuture<'static, ()> {
		(**self).serve_track(track)
	}
}

/// Adapt an async closure into a [TrackHandler].
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
	F: Fn(TrackWriter) -> Fut + Send + Sync,
	Fut: Future<Output = ()> + Send + 'static,
{
	HandlerFn(f)
}

pub struct HandlerFn<F>(F);

impl<F, Fut> TrackHandler for HandlerFn<F>
where
	F: Fn(TrackWriter) -> Fut + Send + Sync,
	Fut: Future<Output = ()> + Send + 'static,
{
	fn serve_track(&self, track: TrackWriter) -> BoxFuture<'static, ()> {
		Box::pin((self.0)(track))
	}
}

/// Routes incoming subscriptions to handlers registered under broadcast paths.
///
/// Lookup is literal, segment by segment; wildcards only exist in announcement
/// patterns. A mux may be mounted inside another mux under a prefix, receiving
/// subscriptions with the prefix stripped.
#[derive(Clone, Default)]
pub struct TrackMux {
	state: Lock<Node>,
	announced: AnnouncementTree,
}

#[derive(Default)]
struct Node {
	children: HashMap<String, Node>,
	route: Option<Route>,
}

#[derive(Clone)]
enum Route {
	Handler(Arc<dyn TrackHandler>),
	Nested(TrackMux),
}

static DEFAULT_MUX: OnceLock<TrackMux> = OnceLock::new();

impl TrackMux {
	pub fn new() -> Self {
		Self::default()
	}

	/// The process-wide default mux, created on first use.
	pub fn global() -> &'static TrackMux {
		DEFAULT_MUX.get_or_init(TrackMux::default)
	}

	/// Install a handler at a concrete path and announce the path as active.
	///
	/// The registration is removed, and the announcement ended, when `ctx` is
	/// cancelled or the returned [Announcement] is ended.
	pub fn publish<H: TrackHandler + 'static>(
		&self,
		ctx: &Context,
		path: BroadcastPath,
		handler: H,
	) -> Result<Announcement, Error> {
		self.install(ctx, path, Route::Handler(Arc::new(handler)))
	}

	/// Mount another mux under a prefix.
	///
	/// Subscriptions for paths beginning with the prefix are routed into the
	/// inner mux with the prefix stripped; the inner mux's announcements are
	/// forwarded outward with the prefix prepended.
	pub fn mount(&self, ctx: &Context, prefix: BroadcastPath, inner: TrackMux) -> Result<(), Error> {
		{
			let mut state = self.state.lock();
			let node = descend(&mut state, &segments(&prefix));
			if node.route.is_some() {
				return Err(Error::Duplicate);
			}
			node.route = Some(Route::Nested(inner.clone()));
		}

		let reader = inner.announced.subscribe(Pattern::new("/**"));
		let outer = self.clone();
		let ctx = ctx.clone();

		web_async::spawn(async move {
			let mut forwarded: HashMap<BroadcastPath, Announcement> = HashMap::new();

			loop {
				let event = tokio::select! {
					event = reader.next() => event,
					_ = ctx.done() => None,
				};

				match event {
					Some(AnnouncedEvent::Active(path)) => {
						let full = BroadcastPath::new(format!("{}{}", prefix, path));
						let announcement = Announcement::new(full);
						if outer.announced.announce(announcement.clone()).is_ok() {
							forwarded.insert(path, announcement);
						}
					}
					Some(AnnouncedEvent::Ended(path)) => {
						if let Some(announcement) = forwarded.remove(&path) {
							announcement.end();
						}
					}
					Some(AnnouncedEvent::Live) => {}
					None => break,
				}
			}

			for (_, announcement) in forwarded.drain() {
				announcement.end();
			}
			outer.remove(&prefix);
		});

		Ok(())
	}

	/// Look up the handler for a concrete path, resolving nested muxes.
	pub fn handler(&self, path: &BroadcastPath) -> Option<Arc<dyn TrackHandler>> {
		self.lookup(&segments(path))
	}

	/// Subscribe to the announcement feed: a snapshot of matching active
	/// paths, a [AnnouncedEvent::Live] marker, then live deltas.
	pub fn announced(&self, pattern: Pattern) -> AnnouncedReader {
		self.announced.subscribe(pattern)
	}

	pub(crate) fn announce(&self, announcement: Announcement) -> Result<(), Error> {
		self.announced.announce(announcement)
	}

	fn install(&self, ctx: &Context, path: BroadcastPath, route: Route) -> Result<Announcement, Error> {
		{
			let mut state = self.state.lock();
			let node = descend(&mut state, &segments(&path));
			if node.route.is_some() {
				return Err(Error::Duplicate);
			}
			node.route = Some(route);
		}

		let announcement = Announcement::new(path.clone());
		if let Err(err) = self.announced.announce(announcement.clone()) {
			self.remove(&path);
			return Err(err);
		}

		let mux = self.clone();
		let registered = path.clone();
		announcement.on_end(move || mux.remove(&registered));

		let ctx = ctx.clone();
		let ended = announcement.clone();
		web_async::spawn(async move {
			tokio::select! {
				_ = ctx.done() => ended.end(),
				_ = ended.context().done() => {}
			}
		});

		Ok(announcement)
	}

	fn lookup(&self, segments: &[String]) -> Option<Arc<dyn TrackHandler>> {
		let state = self.state.lock();
		let mut node = &*state;

		for (index, segment) in segments.iter().enumerate() {
			// A nested mux consumes the rest of the path.
			if let Some(Route::Nested(inner)) = &node.route {
				let inner = inner.clone();
				return inner.lookup(&segments[index..]);
			}
			node = node.children.get(segment)?;
		}

		match &node.route {
			Some(Route::Handler(handler)) => Some(handler.clone()),
			Some(Route::Nested(inner)) => {
				let inner = inner.clone();
				inner.lookup(&[])
			}
			None => None,
		}
	}

	fn remove(&self, path: &BroadcastPath) {
		fn inner(node: &mut Node, segments: &[String]) {
			match segments.split_first() {
				None => node.route = None,
				Some((first, rest)) => {
					if let Some(child) = node.children.get_mut(first) {
						inner(child, rest);
						if child.children.is_empty() && child.route.is_none() {
							node.children.remove(first);
						}
					}
				}
			}
		}

		inner(&mut self.state.lock(), &segments(path));
	}
}

impl TrackHandler for TrackMux {
	fn serve_track(&self, track: TrackWriter) -> BoxFuture<'static, ()> {
		match self.handler(track.path()) {
			Some(handler) => handler.serve_track(track),
			None => Box::pin(async move {
				track.reject(Error::Subscribe(SubscribeCode::TrackDoesNotExist)).await;
			}),
		}
	}
}

fn segments(path: &BroadcastPath) -> Vec<String> {
	path.segments().map(str::to_string).collect()
}

fn descend<'a>(node: &'a mut Node, segments: &[String]) -> &'a mut Node {
	match segments.split_first() {
		None => node,
		Some((first, rest)) => descend(node.children.entry(first.clone()).or_default(), rest),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn noop() -> HandlerFn<impl Fn(TrackWriter) -> futures::future::Ready<()> + Send + Sync> {
		handler_fn(|_track| futures::future::ready(()))
	}

	#[tokio::test]
	async fn publish_then_cancel() {
		let mux = TrackMux::new();
		let ctx = Context::new();
		let path = BroadcastPath::new("/room/alice");

		mux.publish(&ctx, path.clone(), noop()).unwrap();
		assert!(mux.handler(&path).is_some());

		// Duplicate registration is rejected while active.
		assert!(matches!(mux.publish(&ctx, path.clone(), noop()), Err(Error::Duplicate)));

		ctx.cancel(Error::Cancel);
		tokio::task::yield_now().await;

		assert!(mux.handler(&path).is_none());

		// The path is free again after removal.
		let ctx = Context::new();
		mux.publish(&ctx, path.clone(), noop()).unwrap();
		assert!(mux.handler(&path).is_some());
	}

	#[tokio::test]
	async fn ending_the_announcement_removes_the_route() {
		let mux = TrackMux::new();
		let ctx = Context::new();
		let path = BroadcastPath::new("/a/b");

		let announcement = mux.publish(&ctx, path.clone(), noop()).unwrap();
		announcement.end();

		assert!(mux.handler(&path).is_none());
	}

	#[tokio::test]
	async fn nested_mount_routes_with_prefix_stripped() {
		let outer = TrackMux::new();
		let inner = TrackMux::new();
		let ctx = Context::new();

		inner
			.publish(&ctx, BroadcastPath::new("/inner/track"), noop())
			.unwrap();
		outer.mount(&ctx, BroadcastPath::new("/outer"), inner).unwrap();

		assert!(outer.handler(&BroadcastPath::new("/outer/inner/track")).is_some());
		assert!(outer.handler(&BroadcastPath::new("/outer/wrong")).is_none());
		assert!(outer.handler(&BroadcastPath::new("/elsewhere")).is_none());
	}

	#[tokio::test]
	async fn mount_forwards_announcements() {
		let outer = TrackMux::new();
		let inner = TrackMux::new();
		let ctx = Context::new();

		let reader = outer.announced(Pattern::new("/**"));
		assert_eq!(reader.next().await.unwrap(), AnnouncedEvent::Live);

		outer.mount(&ctx, BroadcastPath::new("/outer"), inner.clone()).unwrap();
		let announcement = inner.publish(&ctx, BroadcastPath::new("/inner/track"), noop()).unwrap();

		assert_eq!(
			reader.next().await.unwrap(),
			AnnouncedEvent::Active(BroadcastPath::new("/outer/inner/track"))
		);

		announcement.end();
		assert_eq!(
			reader.next().await.unwrap(),
			AnnouncedEvent::Ended(BroadcastPath::new("/outer/inner/track"))
		);
	}
}
