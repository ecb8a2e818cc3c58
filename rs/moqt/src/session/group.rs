use bytes::Bytes;

use crate::coding::{Reader, Writer};
use crate::message::Frame;
use crate::{Context, Error, GroupCode, GroupSequence};

/// The send half of one group stream.
///
/// Frames are written atomically: a single length prefix followed by the bytes.
/// Writing suspends under transport backpressure; cancelling the owning track
/// unblocks the write with [Error::ClosedGroup].
pub struct GroupWriter {
	context: Context,
	sequence: GroupSequence,
	writer: Option<Writer>,
}

impl GroupWriter {
	pub(crate) fn new(context: Context, sequence: GroupSequence, writer: Writer) -> Self {
		Self {
			context,
			sequence,
			writer: Some(writer),
		}
	}

	pub fn sequence(&self) -> GroupSequence {
		self.sequence
	}

	/// Write one frame, suspending while the transport send buffer is full.
	pub async fn write_frame(&mut self, payload: Bytes) -> Result<(), Error> {
		let frame = Frame(payload);
		let ctx = self.context.clone();
		let writer = self.writer.as_mut().ok_or(Error::ClosedGroup)?;

		let result = tokio::select! {
			res = writer.encode(&frame) => res,
			_ = ctx.done() => Err(Error::ClosedGroup),
		};

		if result.is_err() {
			if let Some(mut writer) = self.writer.take() {
				writer.abort(&Error::ClosedGroup);
			}
		}

		result
	}

	/// Finish the group cleanly; the peer observes EOF after the last frame.
	pub fn close(&mut self) -> Result<(), Error> {
		match self.writer.take() {
			Some(mut writer) => writer.finish(),
			None => Err(Error::ClosedGroup),
		}
	}

	/// Abort the group with a code; any unread frames are discarded by the peer.
	pub fn abort(&mut self, code: GroupCode) {
		if let Some(mut writer) = self.writer.take() {
			writer.abort(&Error::Group(code));
		}
	}
}

/// The receive half of one group stream, after its header has been read.
pub struct GroupReader {
	sequence: GroupSequence,
	reader: Reader,
}

impl GroupReader {
	pub(crate) fn new(sequence: GroupSequence, reader: Reader) -> Self {
		Self { sequence, reader }
	}

	pub fn sequence(&self) -> GroupSequence {
		self.sequence
	}

	/// Read the next frame, or None once the group is cleanly finished.
	pub async fn read_frame(&mut self) -> Result<Option<Bytes>, Error> {
		Ok(self.reader.decode_maybe::<Frame>().await?.map(|frame| frame.0))
	}

	/// Tell the publisher to stop sending this group.
	pub fn stop(&mut self, code: GroupCode) {
		self.reader.stop(&Error::Group(code));
	}
}
