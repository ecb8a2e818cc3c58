use std::io;

use bytes::{Buf, BytesMut};

use crate::coding::{Decode, DecodeError};
use crate::message::Message;
use crate::transport::RecvStream;
use crate::Error;

const READ_CHUNK: usize = 8 * 1024;

/// A buffered reader for decoding values and messages from a stream.
pub(crate) struct Reader {
	stream: Box<dyn RecvStream>,
	buffer: BytesMut,
}

impl Reader {
	pub fn new(stream: Box<dyn RecvStream>) -> Self {
		Self {
			stream,
			buffer: Default::default(),
		}
	}

	/// Decode the next value from the stream.
	pub async fn decode<T: Decode>(&mut self) -> Result<T, Error> {
		loop {
			let mut cursor = io::Cursor::new(&self.buffer);
			match T::decode(&mut cursor) {
				Ok(value) => {
					let size = cursor.position() as usize;
					self.buffer.advance(size);
					return Ok(value);
				}
				Err(DecodeError::Short) => self.fill().await?,
				Err(err) => return Err(Error::Decode(err)),
			}
		}
	}

	/// Decode the next control message, with its type and length framing.
	pub async fn message<M: Message>(&mut self) -> Result<M, Error> {
		loop {
			let mut cursor = io::Cursor::new(&self.buffer);
			match M::decode_framed(&mut cursor) {
				Ok(msg) => {
					let size = cursor.position() as usize;
					self.buffer.advance(size);
					return Ok(msg);
				}
				Err(DecodeError::Short) => self.fill().await?,
				Err(err) => return Err(Error::Decode(err)),
			}
		}
	}

	/// Decode the next control message unless the stream is cleanly closed.
	pub async fn message_maybe<M: Message>(&mut self) -> Result<Option<M>, Error> {
		if self.buffer.is_empty() && !self.fill_maybe().await? {
			return Ok(None);
		}
		Ok(Some(self.message().await?))
	}

	/// Decode the next value unless the stream is cleanly closed.
	pub async fn decode_maybe<T: Decode>(&mut self) -> Result<Option<T>, Error> {
		if self.buffer.is_empty() && !self.fill_maybe().await? {
			return Ok(None);
		}
		Ok(Some(self.decode().await?))
	}

	/// Wait until the stream is cleanly closed, erroring on any additional bytes.
	pub async fn closed(&mut self) -> Result<(), Error> {
		if self.buffer.is_empty() && !self.fill_maybe().await? {
			return Ok(());
		}
		Err(DecodeError::ExpectedEnd.into())
	}

	/// Tell the peer to stop sending, with the error's code.
	pub fn stop(&mut self, err: &Error) {
		self.stream.stop(err.to_code());
	}

	async fn fill(&mut self) -> Result<(), Error> {
		if !self.fill_maybe().await? {
			// Stream closed while we still need more data.
			return Err(Error::Decode(DecodeError::Short));
		}
		Ok(())
	}

	async fn fill_maybe(&mut self) -> Result<bool, Error> {
		match self.stream.read_chunk(READ_CHUNK).await? {
			Some(chunk) => {
				self.buffer.extend_from_slice(&chunk);
				Ok(true)
			}
			None => Ok(false),
		}
	}
}
