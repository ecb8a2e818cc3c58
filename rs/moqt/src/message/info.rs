use crate::coding::{Decode, DecodeError, Encode};
use crate::message::Message;
use crate::{GroupOrder, GroupSequence, TrackPriority};

/// Sent by the subscriber to ask about a track without subscribing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InfoRequest {
	pub broadcast_path: crate::BroadcastPath,
	pub track_name: String,
}

impl Message for InfoRequest {
	const TYPE: u64 = 0x31;

	fn encode_payload<W: bytes::BufMut>(&self, w: &mut W) {
		self.broadcast_path.encode(w);
		self.track_name.encode(w);
	}

	fn decode_payload<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		Ok(Self {
			broadcast_path: crate::BroadcastPath::decode(buf)?,
			track_name: String::decode(buf)?,
		})
	}
}

/// Sent by the publisher in response to [InfoRequest].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Info {
	pub priority: TrackPriority,
	pub order: GroupOrder,
	pub latest_sequence: GroupSequence,
}

impl From<crate::Info> for Info {
	fn from(info: crate::Info) -> Self {
		Self {
			priority: info.priority,
			order: info.order,
			latest_sequence: info.latest,
		}
	}
}

impl From<Info> for crate::Info {
	fn from(msg: Info) -> Self {
		Self {
			priority: msg.priority,
			order: msg.order,
			latest: msg.latest_sequence,
		}
	}
}

impl Message for Info {
	const TYPE: u64 = 0x30;

	fn encode_payload<W: bytes::BufMut>(&self, w: &mut W) {
		self.priority.encode(w);
		self.order.encode(w);
		self.latest_sequence.encode(w);
	}

	fn decode_payload<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		Ok(Self {
			priority: u8::decode(buf)?,
			order: GroupOrder::decode(buf)?,
			latest_sequence: GroupSequence::decode(buf)?,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::message::tests::{decode_message, encode_message};
	use crate::BroadcastPath;

	#[test]
	fn info_request_round_trip() {
		let msg = InfoRequest {
			broadcast_path: BroadcastPath::new("/room/alice"),
			track_name: "camera".to_string(),
		};

		let decoded: InfoRequest = decode_message(&encode_message(&msg)).unwrap();
		assert_eq!(decoded, msg);
	}

	#[test]
	fn info_round_trip() {
		let msg = Info {
			priority: 3,
			order: GroupOrder::Descending,
			latest_sequence: crate::GroupSequence(99),
		};

		let decoded: Info = decode_message(&encode_message(&msg)).unwrap();
		assert_eq!(decoded, msg);
	}

	#[test]
	fn info_converts() {
		let info = crate::Info {
			priority: 7,
			order: GroupOrder::Ascending,
			latest: crate::GroupSequence(12),
		};

		let msg: Info = info.into();
		let back: crate::Info = msg.into();
		assert_eq!(back, info);
	}
}
