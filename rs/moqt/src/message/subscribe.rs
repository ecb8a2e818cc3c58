use crate::coding::{Decode, DecodeError, Encode};
use crate::message::{Message, Parameters};
use crate::{BroadcastPath, GroupOrder, GroupSequence, TrackPriority};

/// Sent by the subscriber to request the frames of one track.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subscribe {
	pub subscribe_id: u64,
	pub broadcast_path: BroadcastPath,
	pub track_name: String,
	pub priority: TrackPriority,
	pub order: GroupOrder,
	/// `0` means unbounded on this end.
	pub min_sequence: GroupSequence,
	/// `0` means unbounded on this end.
	pub max_sequence: GroupSequence,
	pub parameters: Parameters,
}

impl Message for Subscribe {
	const TYPE: u64 = 0x20;

	fn encode_payload<W: bytes::BufMut>(&self, w: &mut W) {
		self.subscribe_id.encode(w);
		self.broadcast_path.encode(w);
		self.track_name.encode(w);
		self.priority.encode(w);
		self.order.encode(w);
		self.min_sequence.encode(w);
		self.max_sequence.encode(w);
		self.parameters.encode(w);
	}

	fn decode_payload<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		Ok(Self {
			subscribe_id: u64::decode(buf)?,
			broadcast_path: BroadcastPath::decode(buf)?,
			track_name: String::decode(buf)?,
			priority: u8::decode(buf)?,
			order: GroupOrder::decode(buf)?,
			min_sequence: GroupSequence::decode(buf)?,
			max_sequence: GroupSequence::decode(buf)?,
			parameters: Parameters::decode(buf)?,
		})
	}
}

/// Sent by the publisher to accept a subscription.
///
/// The publisher may narrow the priority/order and reports its latest sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscribeOk {
	pub priority: TrackPriority,
	pub order: GroupOrder,
	pub latest_sequence: GroupSequence,
}

impl Message for SubscribeOk {
	const TYPE: u64 = 0x21;

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

/// Sent by either side to narrow (never widen) an accepted subscription.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscribeUpdate {
	pub priority: TrackPriority,
	pub order: GroupOrder,
	pub min_sequence: GroupSequence,
	pub max_sequence: GroupSequence,
}

impl Message for SubscribeUpdate {
	const TYPE: u64 = 0x22;

	fn encode_payload<W: bytes::BufMut>(&self, w: &mut W) {
		self.priority.encode(w);
		self.order.encode(w);
		self.min_sequence.encode(w);
		self.max_sequence.encode(w);
	}

	fn decode_payload<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		Ok(Self {
			priority: u8::decode(buf)?,
			order: GroupOrder::decode(buf)?,
			min_sequence: GroupSequence::decode(buf)?,
			max_sequence: GroupSequence::decode(buf)?,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::message::tests::{decode_message, encode_message};

	#[test]
	fn subscribe_round_trip() {
		let msg = Subscribe {
			subscribe_id: 0,
			broadcast_path: BroadcastPath::new("/ns"),
			track_name: "t".to_string(),
			priority: 128,
			order: GroupOrder::Default,
			min_sequence: GroupSequence::UNSPECIFIED,
			max_sequence: GroupSequence::UNSPECIFIED,
			parameters: Parameters::default(),
		};

		let encoded = encode_message(&msg);
		let decoded: Subscribe = decode_message(&encoded).unwrap();
		assert_eq!(decoded, msg);
	}

	#[test]
	fn subscribe_windowed() {
		let msg = Subscribe {
			subscribe_id: 7,
			broadcast_path: BroadcastPath::new("/room/alice"),
			track_name: "camera".to_string(),
			priority: 1,
			order: GroupOrder::Descending,
			min_sequence: GroupSequence(10),
			max_sequence: GroupSequence(20),
			parameters: Parameters::default(),
		};

		let decoded: Subscribe = decode_message(&encode_message(&msg)).unwrap();
		assert_eq!(decoded.min_sequence, GroupSequence(10));
		assert_eq!(decoded.max_sequence, GroupSequence(20));
		assert_eq!(decoded.order, GroupOrder::Descending);
	}

	#[test]
	fn subscribe_ok_round_trip() {
		let msg = SubscribeOk {
			priority: 64,
			order: GroupOrder::Ascending,
			latest_sequence: GroupSequence(42),
		};

		let decoded: SubscribeOk = decode_message(&encode_message(&msg)).unwrap();
		assert_eq!(decoded, msg);
	}

	#[test]
	fn subscribe_update_round_trip() {
		let msg = SubscribeUpdate {
			priority: 128,
			order: GroupOrder::Default,
			min_sequence: GroupSequence(13),
			max_sequence: GroupSequence(20),
		};

		let decoded: SubscribeUpdate = decode_message(&encode_message(&msg)).unwrap();
		assert_eq!(decoded, msg);
	}

	#[test]
	fn subscribe_rejects_unrooted_path() {
		let msg = Subscribe {
			subscribe_id: 0,
			broadcast_path: BroadcastPath::new("/ns"),
			track_name: "t".to_string(),
			priority: 128,
			order: GroupOrder::Default,
			min_sequence: GroupSequence::UNSPECIFIED,
			max_sequence: GroupSequence::UNSPECIFIED,
			parameters: Parameters::default(),
		};

		let mut encoded = encode_message(&msg);
		// The path "/ns" begins right after type, length and subscribe_id; corrupt the slash.
		let slash = encoded
			.iter()
			.position(|&b| b == b'/')
			.expect("path present");
		encoded[slash] = b'x';

		let result: Result<Subscribe, _> = decode_message(&encoded);
		assert!(matches!(result, Err(DecodeError::InvalidPath)));
	}
}
