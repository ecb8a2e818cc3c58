use std::sync::Arc;

use bytes::Bytes;
use futures::future::BoxFuture;

use crate::Error;

/// A uniform, dyn-compatible interface over the QUIC or WebTransport connection.
///
/// The generic bounds of [web_transport_trait::Session] are erased here so the
/// rest of the crate (and user-provided track handlers) can be object-safe.
pub(crate) trait Transport: Send + Sync {
	fn open_bi(&self) -> BoxFuture<'static, Result<(Box<dyn SendStream>, Box<dyn RecvStream>), Error>>;
	fn open_uni(&self) -> BoxFuture<'static, Result<Box<dyn SendStream>, Error>>;
	fn accept_bi(&self) -> BoxFuture<'static, Result<(Box<dyn SendStream>, Box<dyn RecvStream>), Error>>;
	fn accept_uni(&self) -> BoxFuture<'static, Result<Box<dyn RecvStream>, Error>>;

	/// Close the connection with an application error code.
	fn close(&self, code: u32, reason: &str);

	/// Suspend until the connection is closed, returning the reason.
	fn closed(&self) -> BoxFuture<'static, Error>;
}

/// The send half of a stream.
pub(crate) trait SendStream: Send {
	/// Write the entire buffer, suspending under transport backpressure.
	fn write_all(&mut self, data: Bytes) -> BoxFuture<'_, Result<(), Error>>;

	/// Half-close the stream cleanly.
	fn finish(&mut self) -> Result<(), Error>;

	/// Abort the stream with a code.
	fn reset(&mut self, code: u32);

	fn set_priority(&mut self, priority: u8);
}

/// The receive half of a stream.
pub(crate) trait RecvStream: Send {
	/// Return a non-empty chunk of at most `max` bytes, or None on clean EOF.
	fn read_chunk(&mut self, max: usize) -> BoxFuture<'_, Result<Option<Bytes>, Error>>;

	/// Tell the peer to stop sending, with a code.
	fn stop(&mut self, code: u32);
}

fn transport_err<E: std::error::Error + Send + Sync + 'static>(err: E) -> Error {
	Error::Transport(Arc::new(err))
}

impl<S> SendStream for S
where
	S: web_transport_trait::SendStream + Send + 'static,
{
	fn write_all(&mut self, mut data: Bytes) -> BoxFuture<'_, Result<(), Error>> {
		Box::pin(async move {
			while !data.is_empty() {
				web_transport_trait::SendStream::write_buf(self, &mut data)
					.await
					.map_err(transport_err)?;
			}
			Ok(())
		})
	}

	fn finish(&mut self) -> Result<(), Error> {
		web_transport_trait::SendStream::finish(self).map_err(transport_err)
	}

	fn reset(&mut self, code: u32) {
		web_transport_trait::SendStream::reset(self, code);
	}

	fn set_priority(&mut self, priority: u8) {
		web_transport_trait::SendStream::set_priority(self, priority);
	}
}

impl<S> RecvStream for S
where
	S: web_transport_trait::RecvStream + Send + 'static,
{
	fn read_chunk(&mut self, max: usize) -> BoxFuture<'_, Result<Option<Bytes>, Error>> {
		Box::pin(async move {
			web_transport_trait::RecvStream::read_chunk(self, max)
				.await
				.map_err(transport_err)
		})
	}

	fn stop(&mut self, code: u32) {
		web_transport_trait::RecvStream::stop(self, code);
	}
}

impl<S> Transport for S
where
	S: web_transport_trait::Session + Clone + Send + Sync + 'static,
	S::SendStream: Send + 'static,
	S::RecvStream: Send + 'static,
{
	fn open_bi(&self) -> BoxFuture<'static, Result<(Box<dyn SendStream>, Box<dyn RecvStream>), Error>> {
		let session = self.clone();
		Box::pin(async move {
			let (send, recv) = session.open_bi().await.map_err(transport_err)?;
			Ok((Box::new(send) as Box<dyn SendStream>, Box::new(recv) as Box<dyn RecvStream>))
		})
	}

	fn open_uni(&self) -> BoxFuture<'static, Result<Box<dyn SendStream>, Error>> {
		let session = self.clone();
		Box::pin(async move {
			let send = session.open_uni().await.map_err(transport_err)?;
			Ok(Box::new(send) as Box<dyn SendStream>)
		})
	}

	fn accept_bi(&self) -> BoxFuture<'static, Result<(Box<dyn SendStream>, Box<dyn RecvStream>), Error>> {
		let session = self.clone();
		Box::pin(async move {
			let (send, recv) = session.accept_bi().await.map_err(transport_err)?;
			Ok((Box::new(send) as Box<dyn SendStream>, Box::new(recv) as Box<dyn RecvStream>))
		})
	}

	fn accept_uni(&self) -> BoxFuture<'static, Result<Box<dyn RecvStream>, Error>> {
		let session = self.clone();
		Box::pin(async move {
			let recv = session.accept_uni().await.map_err(transport_err)?;
			Ok(Box::new(recv) as Box<dyn RecvStream>)
		})
	}

	fn close(&self, code: u32, reason: &str) {
		web_transport_trait::Session::close(self, code, reason);
	}

	fn closed(&self) -> BoxFuture<'static, Error> {
		let session = self.clone();
		Box::pin(async move {
			let err = session.closed().await;
			Error::Transport(Arc::new(err))
		})
	}
}
