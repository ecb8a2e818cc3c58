use std::fmt;

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::coding::{Decode, DecodeError, Encode};
use crate::{Error, SubscribeCode};

/// The priority of a track; lower values are delivered first.
pub type TrackPriority = u8;

/// The order groups should be delivered in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum GroupOrder {
	/// The publisher decides; groups arrive in the order they were opened.
	#[default]
	Default = 0x00,
	Ascending = 0x01,
	Descending = 0x02,
}

impl Decode for GroupOrder {
	fn decode<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		u8::decode(buf)?.try_into().map_err(|_| DecodeError::InvalidValue)
	}
}

impl Encode for GroupOrder {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		u8::from(*self).encode(w);
	}
}

/// The sequence number of a group within a track.
///
/// `0` means "not specified"; ordinary sequences are `1..=0xFFFF_FFFF` and wrap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupSequence(pub u64);

impl GroupSequence {
	pub const UNSPECIFIED: Self = Self(0);
	pub const MAX: Self = Self(0xFFFF_FFFF);

	pub fn is_unspecified(&self) -> bool {
		self.0 == 0
	}

	/// The next sequence, wrapping `0xFFFF_FFFF` back to `1`.
	pub fn next(&self) -> Self {
		match self.0 {
			0 => Self(1),
			seq if seq >= Self::MAX.0 => Self(1),
			seq => Self(seq + 1),
		}
	}
}

impl From<u64> for GroupSequence {
	fn from(seq: u64) -> Self {
		Self(seq)
	}
}

impl fmt::Display for GroupSequence {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

impl Decode for GroupSequence {
	fn decode<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		Ok(Self(u64::decode(buf)?))
	}
}

impl Encode for GroupSequence {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		self.0.encode(w);
	}
}

/// The sequence range a subscription is interested in.
///
/// `0` on either end means unbounded. Updates may only narrow the window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SequenceWindow {
	pub min: GroupSequence,
	pub max: GroupSequence,
}

impl SequenceWindow {
	pub fn new(min: GroupSequence, max: GroupSequence) -> Self {
		Self { min, max }
	}

	pub fn contains(&self, sequence: GroupSequence) -> bool {
		if !self.min.is_unspecified() && sequence < self.min {
			return false;
		}
		if !self.max.is_unspecified() && sequence > self.max {
			return false;
		}
		true
	}

	/// Replace the window, failing if either end would widen.
	pub fn narrow(&mut self, min: GroupSequence, max: GroupSequence) -> Result<(), Error> {
		let widens_min = min < self.min || (min.is_unspecified() && !self.min.is_unspecified());
		let widens_max = if self.max.is_unspecified() {
			false
		} else {
			max.is_unspecified() || max > self.max
		};

		if widens_min || widens_max {
			return Err(Error::Subscribe(SubscribeCode::InvalidRange));
		}

		self.min = min;
		self.max = max;
		Ok(())
	}
}

/// Information about a track, as negotiated by the publisher.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Info {
	pub priority: TrackPriority,
	pub order: GroupOrder,
	pub latest: GroupSequence,
}

/// The configuration for a new subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrackConfig {
	pub priority: TrackPriority,
	pub order: GroupOrder,
	pub min_sequence: GroupSequence,
	pub max_sequence: GroupSequence,
}

impl Default for TrackConfig {
	fn default() -> Self {
		Self {
			priority: 128,
			order: GroupOrder::Default,
			min_sequence: GroupSequence::UNSPECIFIED,
			max_sequence: GroupSequence::UNSPECIFIED,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn sequence_wraps() {
		assert_eq!(GroupSequence(0).next(), GroupSequence(1));
		assert_eq!(GroupSequence(1).next(), GroupSequence(2));
		assert_eq!(GroupSequence::MAX.next(), GroupSequence(1));
	}

	#[test]
	fn window_bounds() {
		let window = SequenceWindow::new(GroupSequence(10), GroupSequence(20));
		assert!(!window.contains(GroupSequence(9)));
		assert!(window.contains(GroupSequence(10)));
		assert!(window.contains(GroupSequence(20)));
		assert!(!window.contains(GroupSequence(21)));

		let unbounded = SequenceWindow::default();
		assert!(unbounded.contains(GroupSequence(1)));
		assert!(unbounded.contains(GroupSequence::MAX));
	}

	#[test]
	fn narrowing_only() {
		let mut window = SequenceWindow::new(GroupSequence(10), GroupSequence(20));

		window.narrow(GroupSequence(13), GroupSequence(20)).unwrap();
		assert!(!window.contains(GroupSequence(12)));
		assert!(window.contains(GroupSequence(15)));

		// Widening either end is rejected.
		assert!(window.narrow(GroupSequence(10), GroupSequence(20)).is_err());
		assert!(window.narrow(GroupSequence(13), GroupSequence(21)).is_err());
		assert!(window.narrow(GroupSequence(13), GroupSequence::UNSPECIFIED).is_err());

		// Narrowing an unbounded end is allowed.
		let mut open = SequenceWindow::default();
		open.narrow(GroupSequence(5), GroupSequence(9)).unwrap();
		assert_eq!(open, SequenceWindow::new(GroupSequence(5), GroupSequence(9)));
	}
}
