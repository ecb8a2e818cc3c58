use bytes::BytesMut;

use crate::coding::Encode;
use crate::message::Message;
use crate::transport::SendStream;
use crate::Error;

/// A wrapper around a send stream that resets on Drop.
pub(crate) struct Writer {
	stream: Option<Box<dyn SendStream>>,
	buffer: BytesMut,
}

impl Writer {
	pub fn new(stream: Box<dyn SendStream>) -> Self {
		Self {
			stream: Some(stream),
			buffer: Default::default(),
		}
	}

	/// Encode the given value to the stream.
	pub async fn encode<T: Encode>(&mut self, value: &T) -> Result<(), Error> {
		self.buffer.clear();
		value.encode(&mut self.buffer);
		self.flush().await
	}

	/// Encode the given control message, with its type and length framing.
	pub async fn message<M: Message>(&mut self, msg: &M) -> Result<(), Error> {
		self.buffer.clear();
		msg.encode_framed(&mut self.buffer);
		self.flush().await
	}

	/// Mark the stream as finished; no more data may be written.
	pub fn finish(&mut self) -> Result<(), Error> {
		if let Some(mut stream) = self.stream.take() {
			stream.finish()?;
		}
		Ok(())
	}

	/// Abort the stream with the given error's code.
	pub fn abort(&mut self, err: &Error) {
		if let Some(mut stream) = self.stream.take() {
			stream.reset(err.to_code());
		}
	}

	/// Set the priority of the stream; lower values are sent first.
	pub fn set_priority(&mut self, priority: u8) {
		if let Some(stream) = self.stream.as_mut() {
			stream.set_priority(priority);
		}
	}

	async fn flush(&mut self) -> Result<(), Error> {
		let data = self.buffer.split().freeze();
		self.stream.as_mut().expect("stream taken").write_all(data).await
	}
}

impl Drop for Writer {
	fn drop(&mut self) {
		if let Some(mut stream) = self.stream.take() {
			// Unlike the transport default, we abort the stream on drop.
			stream.reset(Error::Cancel.to_code());
		}
	}
}
