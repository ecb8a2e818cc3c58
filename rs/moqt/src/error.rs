use std::sync::Arc;

use num_enum::{IntoPrimitive, TryFromPrimitive};
use thiserror::Error;

use crate::coding::DecodeError;
use crate::message::Versions;

/// A [std::error::Error] that can be sent between threads.
pub trait SendSyncError: std::error::Error + Send + Sync {}
impl<T: std::error::Error + Send + Sync> SendSyncError for T {}

/// Every error surfaced by this crate, layered by the stream family it occurred on.
///
/// Each family carries a stable numeric code used when closing the stream or connection.
#[derive(Error, Debug, Clone)]
pub enum Error {
	/// The session was terminated with a connection-level application code.
	#[error("session terminated: {0}")]
	Session(TerminateCode),

	/// An announce stream failed.
	#[error("announce error: {0}")]
	Announce(AnnounceCode),

	/// A subscribe stream was rejected or failed.
	#[error("subscribe error: {0}")]
	Subscribe(SubscribeCode),

	/// The publisher ended a subscription, with a reason.
	#[error("subscribe done: {0}")]
	SubscribeDone(SubscribeDoneCode),

	/// A group stream was aborted.
	#[error("group error: {0}")]
	Group(GroupCode),

	/// The peer reset the session control stream.
	///
	/// The raw reset code is deliberately not surfaced; WebTransport tunneling constrains
	/// the numeric space differently from raw QUIC, so the session family always reports
	/// a protocol violation instead.
	#[error("protocol violation: closed session stream")]
	ClosedSessionStream,

	/// A frame was written to a group that was already closed or aborted.
	#[error("closed group")]
	ClosedGroup,

	#[error("decode error: {0}")]
	Decode(#[from] DecodeError),

	#[error("parameter error: {0}")]
	Parameter(#[from] ParameterError),

	#[error("transport error: {0}")]
	Transport(Arc<dyn SendSyncError>),

	/// Version negotiation failed; no offered version is supported.
	#[error("unsupported versions: offered={0:?} supported={1:?}")]
	Version(Versions, Versions),

	/// The first byte of a stream did not identify a known stream family.
	#[error("unexpected stream type: {0}")]
	UnexpectedStream(u8),

	/// The operation was cancelled by its context.
	#[error("cancelled")]
	Cancel,

	/// The announcement or subscription already exists.
	#[error("duplicate")]
	Duplicate,
}

impl Error {
	/// The numeric code used when resetting the stream this error occurred on.
	pub fn to_code(&self) -> u32 {
		match self {
			Self::Session(code) => u8::from(*code) as u32,
			Self::Announce(code) => u8::from(*code) as u32,
			Self::Subscribe(code) => u8::from(*code) as u32,
			Self::SubscribeDone(code) => u8::from(*code) as u32,
			Self::Group(code) => u8::from(*code) as u32,
			Self::ClosedSessionStream => u8::from(TerminateCode::ProtocolViolation) as u32,
			Self::ClosedGroup => u8::from(GroupCode::SendInterrupted) as u32,
			Self::Decode(_) => u8::from(TerminateCode::ProtocolViolation) as u32,
			Self::Parameter(_) => u8::from(TerminateCode::ParameterLengthMismatch) as u32,
			Self::Transport(_) => u8::from(TerminateCode::InternalError) as u32,
			Self::Version(..) => u8::from(TerminateCode::ProtocolViolation) as u32,
			Self::UnexpectedStream(_) => u8::from(TerminateCode::ProtocolViolation) as u32,
			Self::Cancel => u8::from(TerminateCode::NoError) as u32,
			Self::Duplicate => u8::from(TerminateCode::ProtocolViolation) as u32,
		}
	}

	/// The connection-level application code used when terminating the session.
	pub fn to_terminate(&self) -> TerminateCode {
		match self {
			Self::Session(code) => *code,
			Self::Cancel => TerminateCode::NoError,
			Self::Transport(_) => TerminateCode::InternalError,
			Self::Parameter(_) => TerminateCode::ParameterLengthMismatch,
			_ => TerminateCode::ProtocolViolation,
		}
	}

	/// Translate a raw reset code received on a subscribe stream.
	pub fn from_subscribe_code(code: u32) -> Self {
		match u8::try_from(code).ok().and_then(|c| SubscribeCode::try_from(c).ok()) {
			Some(code) => Self::Subscribe(code),
			None => Self::Subscribe(SubscribeCode::InternalError),
		}
	}

	/// Translate a raw reset code received on a group stream.
	pub fn from_group_code(code: u32) -> Self {
		match u8::try_from(code).ok().and_then(|c| GroupCode::try_from(c).ok()) {
			Some(code) => Self::Group(code),
			None => Self::Group(GroupCode::InternalError),
		}
	}
}

/// Connection-level application codes used to terminate a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum TerminateCode {
	NoError = 0x00,
	InternalError = 0x01,
	Unauthorized = 0x02,
	ProtocolViolation = 0x03,
	ParameterLengthMismatch = 0x05,
	TooManySubscribes = 0x06,
	GoAwayTimeout = 0x10,
}

/// Stream-level codes for announce streams.
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum AnnounceCode {
	InternalError = 0x00,
	DuplicatedTrackPath = 0x01,
	DuplicatedInterest = 0x02,
}

/// Stream-level codes for rejecting or failing a subscribe stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum SubscribeCode {
	InternalError = 0x00,
	InvalidRange = 0x01,
	DuplicateId = 0x02,
	TrackDoesNotExist = 0x03,
	Unauthorized = 0x04,
	Timeout = 0x05,
	UpdateError = 0x06,
	PriorityMismatch = 0x07,
	OrderMismatch = 0x08,
}

/// Reasons a publisher gives when ending an accepted subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum SubscribeDoneCode {
	Unsubscribed = 0x00,
	InternalError = 0x01,
	Unauthorized = 0x02,
	TrackEnded = 0x03,
	SubscriptionEnded = 0x04,
	GoingAway = 0x05,
	Expired = 0x06,
}

/// Stream-level codes for aborting a group stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum GroupCode {
	InternalError = 0x00,
	SendInterrupted = 0x01,
	OutOfRange = 0x02,
	Expired = 0x03,
	DeliveryTimeout = 0x04,
	TrackDoesNotExist = 0x05,
	DuplicatedGroup = 0x10,
}

macro_rules! code_display {
	($($ty:ty),*) => {
		$(impl std::fmt::Display for $ty {
			fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
				write!(f, "{:?} (0x{:02x})", self, u8::from(*self))
			}
		})*
	};
}

code_display!(TerminateCode, AnnounceCode, SubscribeCode, SubscribeDoneCode, GroupCode);

/// An error returned by the typed accessors of [crate::Parameters].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterError {
	#[error("parameter not found")]
	NotFound,

	#[error("parameter type mismatch")]
	TypeMismatch,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn code_values() {
		assert_eq!(u8::from(TerminateCode::GoAwayTimeout), 0x10);
		assert_eq!(u8::from(SubscribeCode::OrderMismatch), 0x08);
		assert_eq!(u8::from(SubscribeDoneCode::Expired), 0x06);
		assert_eq!(u8::from(GroupCode::DuplicatedGroup), 0x10);
		assert_eq!(u8::from(AnnounceCode::DuplicatedInterest), 0x02);
	}

	#[test]
	fn session_stream_reset_is_not_reused() {
		// A raw reset code on the session stream must surface as a protocol violation.
		let err = Error::ClosedSessionStream;
		assert_eq!(err.to_code(), u8::from(TerminateCode::ProtocolViolation) as u32);
		assert_eq!(err.to_string(), "protocol violation: closed session stream");
	}

	#[test]
	fn unknown_reset_codes_fall_back_to_internal() {
		assert!(matches!(
			Error::from_subscribe_code(0xdead),
			Error::Subscribe(SubscribeCode::InternalError)
		));
		assert!(matches!(
			Error::from_group_code(0x0f),
			Error::Group(GroupCode::InternalError)
		));
	}
}
