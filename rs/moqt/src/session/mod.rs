mod group;
mod publisher;
mod subscriber;
mod track;

pub use group::{GroupReader, GroupWriter};
pub use track::{TrackReader, TrackWriter};

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use publisher::Publisher;
use subscriber::Subscriber;

use crate::coding::{Reader, Stream, Writer};
use crate::message::{
	AnnouncePlease, GroupHeader, InfoRequest, Parameters, SessionClient, SessionServer, SessionUpdate, StreamType,
	Version, GROUP_STREAM,
};
use crate::transport::Transport;
use crate::{
	AnnouncedEvent, AnnouncedReader, BroadcastPath, Context, Error, GroupSequence, Info, Pattern, TerminateCode,
	TrackConfig, TrackMux, TrackPriority,
};

/// A live endpoint-to-endpoint context over one QUIC or WebTransport connection.
///
/// Cheaply cloneable; all clones share the same connection and state. The
/// session spawns its own accept loops and runs until either side closes the
/// connection or the session control stream.
#[derive(Clone)]
pub struct Session {
	transport: Arc<dyn Transport>,
	context: Context,
	version: Version,
	path: Option<String>,
	client_params: Parameters,
	server_params: Parameters,
	writer: Arc<tokio::sync::Mutex<Option<Writer>>>,
	publisher: Publisher,
	subscriber: Subscriber,
	remote_bitrate: Arc<AtomicU64>,
}

impl Session {
	/// Dial: open the session stream and perform the handshake as the initiator.
	///
	/// On raw QUIC the `path` is mandatory and carried as a session parameter.
	pub async fn connect<T>(transport: T, path: Option<String>, mux: TrackMux) -> Result<Self, Error>
	where
		T: web_transport_trait::Session + Clone + Send + Sync + 'static,
		T::SendStream: Send + 'static,
		T::RecvStream: Send + 'static,
	{
		Self::connect_inner(Arc::new(transport), path, mux).await
	}

	/// Respond: accept the session stream and perform the handshake.
	pub async fn accept<T>(transport: T, mux: TrackMux) -> Result<Self, Error>
	where
		T: web_transport_trait::Session + Clone + Send + Sync + 'static,
		T::SendStream: Send + 'static,
		T::RecvStream: Send + 'static,
	{
		Self::accept_inner(Arc::new(transport), mux, false).await
	}

	/// Like [Self::accept], but for raw QUIC: a missing or empty `PATH`
	/// parameter fails the setup with a protocol violation.
	pub async fn accept_raw<T>(transport: T, mux: TrackMux) -> Result<Self, Error>
	where
		T: web_transport_trait::Session + Clone + Send + Sync + 'static,
		T::SendStream: Send + 'static,
		T::RecvStream: Send + 'static,
	{
		Self::accept_inner(Arc::new(transport), mux, true).await
	}

	pub(crate) async fn connect_inner(
		transport: Arc<dyn Transport>,
		path: Option<String>,
		mux: TrackMux,
	) -> Result<Self, Error> {
		let mut stream = Stream::open(&transport).await?;

		let mut parameters = Parameters::default();
		if let Some(path) = &path {
			parameters.set_string(Parameters::PATH, path);
		}

		let client = SessionClient {
			versions: [Version::DEVELOP].into(),
			parameters,
		};

		let result = async {
			stream.writer.encode(&StreamType::Session).await?;
			stream.writer.message(&client).await?;
			stream.reader.message::<SessionServer>().await
		}
		.await;

		let server = match result {
			Ok(server) => server,
			Err(err) => {
				stream.abort(&err);
				return Err(err);
			}
		};

		if server.version != Version::DEVELOP {
			let err = Error::Version(client.versions.clone(), [server.version].into());
			stream.abort(&err);
			transport.close(err.to_code(), "unsupported version");
			return Err(err);
		}

		tracing::debug!(version = ?server.version, "session established");
		Ok(Self::start(
			transport,
			stream,
			server.version,
			client.parameters,
			server.parameters,
			path,
			mux,
		))
	}

	pub(crate) async fn accept_inner(
		transport: Arc<dyn Transport>,
		mux: TrackMux,
		require_path: bool,
	) -> Result<Self, Error> {
		let mut stream = Stream::accept(&transport).await?;

		let byte: u8 = stream.reader.decode().await?;
		if byte != u8::from(StreamType::Session) {
			let err = Error::UnexpectedStream(byte);
			stream.abort(&err);
			transport.close(err.to_code(), "expected session stream");
			return Err(err);
		}

		let client: SessionClient = match stream.reader.message().await {
			Ok(client) => client,
			Err(err) => {
				stream.abort(&err);
				transport.close(err.to_code(), "setup failed");
				return Err(err);
			}
		};

		if !client.versions.contains(&Version::DEVELOP) {
			let err = Error::Version(client.versions.clone(), [Version::DEVELOP].into());
			stream.abort(&err);
			transport.close(err.to_code(), "no supported version");
			return Err(err);
		}

		let path = client
			.parameters
			.get_string(Parameters::PATH)
			.ok()
			.filter(|path| !path.is_empty());

		if require_path && path.is_none() {
			let err = Error::Session(TerminateCode::ProtocolViolation);
			stream.abort(&err);
			transport.close(err.to_code(), "missing path parameter");
			return Err(err);
		}

		let server = SessionServer {
			version: Version::DEVELOP,
			parameters: Parameters::default(),
		};
		if let Err(err) = stream.writer.message(&server).await {
			stream.abort(&err);
			return Err(err);
		}

		tracing::debug!(version = ?server.version, ?path, "session accepted");
		Ok(Self::start(
			transport,
			stream,
			server.version,
			client.parameters,
			server.parameters,
			path,
			mux,
		))
	}

	fn start(
		transport: Arc<dyn Transport>,
		stream: Stream,
		version: Version,
		client_params: Parameters,
		server_params: Parameters,
		path: Option<String>,
		mux: TrackMux,
	) -> Self {
		let context = Context::new();
		let Stream { writer, reader } = stream;

		let session = Self {
			transport: transport.clone(),
			context: context.clone(),
			version,
			path,
			client_params,
			server_params,
			writer: Arc::new(tokio::sync::Mutex::new(Some(writer))),
			publisher: Publisher::new(transport.clone(), context.clone(), mux),
			subscriber: Subscriber::new(transport, context),
			remote_bitrate: Arc::new(AtomicU64::new(0)),
		};

		let run = session.clone();
		web_async::spawn(async move { run.run(reader).await });

		session
	}

	/// The negotiated protocol version.
	pub fn version(&self) -> Version {
		self.version
	}

	/// The session path, negotiated or derived from the URL.
	pub fn path(&self) -> Option<&str> {
		self.path.as_deref()
	}

	pub fn client_params(&self) -> &Parameters {
		&self.client_params
	}

	pub fn server_params(&self) -> &Parameters {
		&self.server_params
	}

	/// A context that becomes done when the session ends; its cause says why.
	pub fn context(&self) -> &Context {
		&self.context
	}

	/// Subscribe to a track, suspending until the publisher accepts or rejects.
	pub async fn subscribe(&self, path: BroadcastPath, name: &str, config: TrackConfig) -> Result<TrackReader, Error> {
		self.subscriber.subscribe(path, name, config).await
	}

	/// Fetch a single group: a one-shot subscription that accepts no updates.
	pub async fn fetch(
		&self,
		path: BroadcastPath,
		name: &str,
		priority: TrackPriority,
		sequence: GroupSequence,
	) -> Result<TrackReader, Error> {
		self.subscriber.fetch(path, name, priority, sequence).await
	}

	/// Ask about a track without subscribing to it.
	pub async fn request_info(&self, path: BroadcastPath, name: &str) -> Result<Info, Error> {
		let mut stream = Stream::open(&self.transport).await?;

		let result = async {
			stream.writer.encode(&StreamType::Info).await?;
			stream
				.writer
				.message(&InfoRequest {
					broadcast_path: path,
					track_name: name.to_string(),
				})
				.await?;
			stream.reader.message::<crate::message::Info>().await
		}
		.await;

		match result {
			Ok(info) => {
				stream.writer.finish()?;
				Ok(info.into())
			}
			Err(err) => {
				stream.abort(&err);
				Err(err)
			}
		}
	}

	/// Subscribe to the peer's announcement feed for a pattern.
	///
	/// The feed starts with a snapshot of matching active paths, then a
	/// [AnnouncedEvent::Live] marker, then live deltas.
	pub async fn announced(&self, pattern: Pattern) -> Result<AnnouncedReader, Error> {
		let mut stream = Stream::open(&self.transport).await?;

		let result = async {
			stream.writer.encode(&StreamType::Announce).await?;
			stream
				.writer
				.message(&AnnouncePlease {
					prefix: pattern.as_str().to_string(),
					parameters: Default::default(),
				})
				.await
		}
		.await;

		if let Err(err) = result {
			stream.abort(&err);
			return Err(err);
		}

		let (sender, recv) = async_channel::bounded(32);
		let literal = pattern.prefix();
		let context = self.context.clone();

		web_async::spawn(async move {
			// The writer holds our half open; dropping it cancels the interest.
			let Stream { writer: _writer, mut reader } = stream;
			let mut active = HashSet::new();
			let mut live = false;

			loop {
				let msg = tokio::select! {
					res = reader.message_maybe::<crate::message::Announce>() => res,
					_ = context.done() => break,
				};

				let msg = match msg {
					Ok(Some(msg)) => msg,
					Ok(None) | Err(_) => break,
				};

				let event = match msg.status {
					crate::message::AnnounceStatus::Live => {
						if live {
							reader.stop(&Error::Session(TerminateCode::ProtocolViolation));
							break;
						}
						live = true;
						AnnouncedEvent::Live
					}
					status => {
						let path = match full_path(&literal, &msg.suffix) {
							Some(path) => path,
							None => {
								reader.stop(&Error::Session(TerminateCode::ProtocolViolation));
								break;
							}
						};

						let valid = match status {
							crate::message::AnnounceStatus::Active => active.insert(path.clone()),
							_ => active.remove(&path),
						};
						// Duplicate active or ended-without-active.
						if !valid {
							reader.stop(&Error::Session(TerminateCode::ProtocolViolation));
							break;
						}

						match status {
							crate::message::AnnounceStatus::Active => AnnouncedEvent::Active(path),
							_ => AnnouncedEvent::Ended(path),
						}
					}
				};

				// Suspending here applies backpressure to the wire.
				if sender.send(event).await.is_err() {
					reader.stop(&Error::Cancel);
					break;
				}
			}
		});

		Ok(AnnouncedReader { recv })
	}

	/// Send advisory flow information; may be called at any time.
	pub async fn update_bitrate(&self, bitrate: u64) -> Result<(), Error> {
		match self.writer.lock().await.as_mut() {
			Some(writer) => writer.message(&SessionUpdate { bitrate }).await,
			None => Err(self.context.cause().unwrap_or(Error::Cancel)),
		}
	}

	/// The most recent bitrate advertised by the peer, or 0.
	pub fn remote_bitrate(&self) -> u64 {
		self.remote_bitrate.load(Ordering::Relaxed)
	}

	/// Close the session gracefully.
	pub async fn close(&self) -> Result<(), Error> {
		if let Some(mut writer) = self.writer.lock().await.take() {
			writer.finish()?;
		}
		self.context.cancel(Error::Session(TerminateCode::NoError));
		self.transport.close(u8::from(TerminateCode::NoError) as u32, "");
		Ok(())
	}

	/// Close the session abruptly with a connection-level application code.
	pub fn close_with_error(&self, code: TerminateCode, reason: &str) {
		self.transport.close(u8::from(code) as u32, reason);
		self.context.cancel(Error::Session(code));
	}

	async fn run(self, reader: Reader) {
		let result = tokio::select! {
			res = self.run_session(reader) => res,
			res = self.run_bidi() => res,
			res = self.run_uni() => res,
			err = self.transport.closed() => Err(err),
			_ = self.context.done() => Err(self.context.cause().unwrap_or(Error::Cancel)),
		};

		let cause = match result {
			Ok(()) => {
				tracing::debug!("session closed");
				Error::Session(TerminateCode::NoError)
			}
			Err(err) => {
				tracing::debug!(%err, "session terminated");
				err
			}
		};

		self.transport.close(u8::from(cause.to_terminate()) as u32, &cause.to_string());
		self.context.cancel(cause.clone());
		self.subscriber.close(&cause);
	}

	/// Read the session control stream until it ends.
	///
	/// Clean EOF is a graceful close. Any transport error surfaces as
	/// "closed session stream"; the raw reset code is never reused.
	async fn run_session(&self, mut reader: Reader) -> Result<(), Error> {
		loop {
			match reader.message_maybe::<SessionUpdate>().await {
				Ok(Some(update)) => {
					self.remote_bitrate.store(update.bitrate, Ordering::Relaxed);
				}
				Ok(None) => return Ok(()),
				Err(Error::Transport(_)) => return Err(Error::ClosedSessionStream),
				Err(err) => return Err(err),
			}
		}
	}

	async fn run_bidi(&self) -> Result<(), Error> {
		loop {
			let (send, recv) = self.transport.accept_bi().await?;
			let session = self.clone();
			let stream = Stream {
				writer: Writer::new(send),
				reader: Reader::new(recv),
			};
			web_async::spawn(async move { session.handle_bidi(stream).await });
		}
	}

	async fn handle_bidi(&self, mut stream: Stream) {
		let byte: u8 = match stream.reader.decode().await {
			Ok(byte) => byte,
			Err(err) => {
				stream.abort(&err);
				return;
			}
		};

		match StreamType::try_from(byte) {
			Ok(StreamType::Announce) => self.publisher.serve_announce(stream).await,
			Ok(StreamType::Subscribe) => self.publisher.serve_subscribe(stream).await,
			Ok(StreamType::Fetch) => self.publisher.serve_fetch(stream).await,
			Ok(StreamType::Info) => self.publisher.serve_info(stream).await,
			Ok(StreamType::Session) => {
				// A second session stream is fatal.
				let err = Error::Session(TerminateCode::ProtocolViolation);
				stream.abort(&err);
				self.context.cancel(err);
			}
			Err(_) => {
				tracing::warn!(byte, "unknown bidirectional stream type");
				stream.abort(&Error::UnexpectedStream(byte));
			}
		}
	}

	async fn run_uni(&self) -> Result<(), Error> {
		loop {
			let recv = self.transport.accept_uni().await?;
			let session = self.clone();
			web_async::spawn(async move { session.handle_uni(Reader::new(recv)).await });
		}
	}

	async fn handle_uni(&self, mut reader: Reader) {
		let byte: u8 = match reader.decode().await {
			Ok(byte) => byte,
			Err(err) => {
				reader.stop(&err);
				return;
			}
		};

		if byte != GROUP_STREAM {
			tracing::warn!(byte, "unknown unidirectional stream type");
			reader.stop(&Error::UnexpectedStream(byte));
			return;
		}

		let header: GroupHeader = match reader.decode().await {
			Ok(header) => header,
			Err(err) => {
				reader.stop(&err);
				return;
			}
		};

		self.subscriber.route_group(header, reader);
	}
}

/// Rebuild a full path from the interest's literal prefix and a wire suffix.
fn full_path(literal: &str, suffix: &str) -> Option<BroadcastPath> {
	if suffix.is_empty() {
		return Some(BroadcastPath::new(literal.to_string()));
	}
	if !suffix.starts_with('/') {
		return None;
	}
	Some(BroadcastPath::new(format!(
		"{}{}",
		literal.trim_end_matches('/'),
		suffix
	)))
}
