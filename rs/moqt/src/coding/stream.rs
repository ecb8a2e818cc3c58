use std::sync::Arc;

use crate::coding::{Reader, Writer};
use crate::transport::Transport;
use crate::Error;

/// A [Writer] and [Reader] pair for a single bidirectional stream.
pub(crate) struct Stream {
	pub writer: Writer,
	pub reader: Reader,
}

impl Stream {
	/// Open a new bidirectional stream.
	pub async fn open(transport: &Arc<dyn Transport>) -> Result<Self, Error> {
		let (send, recv) = transport.open_bi().await?;
		Ok(Self {
			writer: Writer::new(send),
			reader: Reader::new(recv),
		})
	}

	/// Accept a new bidirectional stream.
	pub async fn accept(transport: &Arc<dyn Transport>) -> Result<Self, Error> {
		let (send, recv) = transport.accept_bi().await?;
		Ok(Self {
			writer: Writer::new(send),
			reader: Reader::new(recv),
		})
	}

	/// Abort both directions with the given error's code.
	pub fn abort(&mut self, err: &Error) {
		self.writer.abort(err);
		self.reader.stop(err);
	}
}
