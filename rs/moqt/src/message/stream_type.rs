use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::coding::{Decode, DecodeError, Encode};

/// The first byte of every bidirectional stream, identifying its family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum StreamType {
	Session = 0x00,
	Announce = 0x01,
	Subscribe = 0x02,
	Fetch = 0x03,
	Info = 0x04,
}

/// The first byte of every unidirectional stream.
pub const GROUP_STREAM: u8 = 0x00;

impl Decode for StreamType {
	fn decode<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		u8::decode(buf)?.try_into().map_err(|_| DecodeError::InvalidValue)
	}
}

impl Encode for StreamType {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		u8::from(*self).encode(w);
	}
}
