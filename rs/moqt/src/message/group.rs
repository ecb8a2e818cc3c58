use bytes::Bytes;

use crate::coding::{Decode, DecodeError, Encode};
use crate::GroupSequence;

/// The header of a unidirectional group stream.
///
/// Group streams are not control streams: the header follows the stream type
/// byte directly, with no message framing, and frames follow the header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GroupHeader {
	/// The subscription this group belongs to.
	pub subscribe_id: u64,
	pub sequence: GroupSequence,
}

impl Decode for GroupHeader {
	fn decode<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		Ok(Self {
			subscribe_id: u64::decode(buf)?,
			sequence: GroupSequence::decode(buf)?,
		})
	}
}

impl Encode for GroupHeader {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		self.subscribe_id.encode(w);
		self.sequence.encode(w);
	}
}

/// A length-prefixed payload within a group stream.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Frame(pub Bytes);

impl Decode for Frame {
	fn decode<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		Ok(Self(Bytes::decode(buf)?))
	}
}

impl Encode for Frame {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		self.0.encode(w);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn group_header_round_trip() {
		let header = GroupHeader {
			subscribe_id: 9,
			sequence: GroupSequence(1234),
		};

		let mut encoded = header.encode_bytes();
		let decoded = GroupHeader::decode(&mut encoded).unwrap();
		assert_eq!(decoded, header);
	}

	#[test]
	fn frames_in_sequence() {
		let mut buf = bytes::BytesMut::new();
		Frame(Bytes::from_static(b"hello")).encode(&mut buf);
		Frame(Bytes::from_static(b"")).encode(&mut buf);
		Frame(Bytes::from_static(b"world")).encode(&mut buf);

		let mut read = buf.freeze();
		assert_eq!(Frame::decode(&mut read).unwrap().0.as_ref(), b"hello");
		assert!(Frame::decode(&mut read).unwrap().0.is_empty());
		assert_eq!(Frame::decode(&mut read).unwrap().0.as_ref(), b"world");
		assert!(!bytes::Buf::has_remaining(&read));
	}

	#[test]
	fn truncated_frame_is_short() {
		let mut buf = bytes::BytesMut::new();
		Frame(Bytes::from_static(b"hello")).encode(&mut buf);

		let full = buf.freeze();
		let mut truncated = full.slice(..full.len() - 2);
		assert!(matches!(Frame::decode(&mut truncated), Err(DecodeError::Short)));
	}
}
