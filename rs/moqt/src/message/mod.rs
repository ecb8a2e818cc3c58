//! Control messages and their wire framing.
//!
//! Every control message is framed as `type VLI | payload-length VLI | payload`.
//! Group streams are not control streams; [GroupHeader] and [Frame] are raw.

mod announce;
mod fetch;
mod group;
mod info;
mod parameters;
mod session;
mod stream_type;
mod subscribe;

pub use announce::*;
pub use fetch::*;
pub use group::*;
pub use info::*;
pub use parameters::*;
pub use session::*;
pub use stream_type::*;
pub use subscribe::*;

use bytes::{Buf, BufMut, BytesMut};

use crate::coding::{Decode, DecodeError, Encode};

/// A control message with a type code and length-prefixed payload.
pub trait Message: Sized {
	/// The message type code on the wire.
	const TYPE: u64;

	fn encode_payload<W: BufMut>(&self, w: &mut W);
	fn decode_payload<B: Buf>(buf: &mut B) -> Result<Self, DecodeError>;

	/// Encode with the `type | length | payload` framing.
	fn encode_framed<W: BufMut>(&self, w: &mut W) {
		Self::TYPE.encode(w);

		let mut payload = BytesMut::new();
		self.encode_payload(&mut payload);

		payload.len().encode(w);
		w.put(payload);
	}

	/// Decode with the `type | length | payload` framing.
	///
	/// Any type other than [Self::TYPE] is a protocol violation; a payload the
	/// decoder does not fully consume is too.
	fn decode_framed<B: Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		let kind = u64::decode(buf)?;
		if kind != Self::TYPE {
			return Err(DecodeError::UnknownMessage(kind));
		}

		let size = usize::decode(buf)?;
		if buf.remaining() < size {
			return Err(DecodeError::Short);
		}

		let mut payload = buf.copy_to_bytes(size);
		let msg = Self::decode_payload(&mut payload)?;
		if payload.has_remaining() {
			return Err(DecodeError::Long);
		}

		Ok(msg)
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;

	pub fn encode_message<M: Message>(msg: &M) -> Vec<u8> {
		let mut buf = BytesMut::new();
		msg.encode_framed(&mut buf);
		buf.to_vec()
	}

	pub fn decode_message<M: Message>(bytes: &[u8]) -> Result<M, DecodeError> {
		let mut buf = bytes::Bytes::copy_from_slice(bytes);
		let msg = M::decode_framed(&mut buf)?;
		if buf.has_remaining() {
			return Err(DecodeError::Long);
		}
		Ok(msg)
	}

	#[test]
	fn framing_rejects_unknown_type() {
		let encoded = encode_message(&SessionUpdate { bitrate: 42 });
		let result: Result<Subscribe, _> = decode_message(&encoded);
		assert!(matches!(result, Err(DecodeError::UnknownMessage(_))));
	}

	#[test]
	fn framing_rejects_truncated_payload() {
		let mut encoded = encode_message(&SessionUpdate { bitrate: 123456 });
		encoded.truncate(encoded.len() - 1);
		let result: Result<SessionUpdate, _> = decode_message(&encoded);
		assert!(matches!(result, Err(DecodeError::Short)));
	}

	#[test]
	fn framing_rejects_trailing_garbage() {
		// type=SessionUpdate, length=2, but the payload varint only consumes 1 byte.
		let encoded = [0x02, 0x02, 0x01, 0xff];
		let result: Result<SessionUpdate, _> = decode_message(&encoded);
		assert!(matches!(result, Err(DecodeError::Long)));
	}
}
