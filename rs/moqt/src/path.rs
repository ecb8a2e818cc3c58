use std::fmt;

use crate::coding::{Decode, DecodeError, Encode};

/// A hierarchical `/`-separated path identifying a broadcast.
///
/// Paths are case-sensitive, always begin with `/`, and never contain wildcards.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BroadcastPath(String);

impl BroadcastPath {
	pub fn new<T: Into<String>>(path: T) -> Self {
		let path = path.into();
		debug_assert!(path.starts_with('/'), "broadcast path must start with '/'");
		Self(path)
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// The non-empty segments of the path, in order.
	pub fn segments(&self) -> impl Iterator<Item = &str> {
		self.0.split('/').filter(|s| !s.is_empty())
	}

	/// Returns true if `prefix` is a slash-aligned strict prefix of this path.
	///
	/// The empty string is never a prefix, and a path is not a prefix of itself.
	pub fn has_prefix(&self, prefix: &str) -> bool {
		if prefix.is_empty() || prefix.len() >= self.0.len() || !prefix.starts_with('/') {
			return false;
		}

		match self.0.strip_prefix(prefix) {
			Some(rest) => prefix.ends_with('/') || rest.starts_with('/'),
			None => false,
		}
	}

	/// Strip a slash-aligned prefix, keeping the leading `/` of the remainder.
	pub fn strip_prefix(&self, prefix: &str) -> Option<&str> {
		if prefix == "/" {
			return Some(&self.0);
		}
		if !self.has_prefix(prefix) {
			return None;
		}
		Some(&self.0[prefix.trim_end_matches('/').len()..])
	}
}

impl From<&str> for BroadcastPath {
	fn from(path: &str) -> Self {
		Self::new(path)
	}
}

impl From<String> for BroadcastPath {
	fn from(path: String) -> Self {
		Self::new(path)
	}
}

impl fmt::Display for BroadcastPath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

impl fmt::Debug for BroadcastPath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

impl Decode for BroadcastPath {
	fn decode<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		let path = String::decode(buf)?;
		if !path.starts_with('/') {
			return Err(DecodeError::InvalidPath);
		}
		Ok(Self(path))
	}
}

impl Encode for BroadcastPath {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		self.0.encode(w);
	}
}

/// A glob pattern over broadcast paths.
///
/// `*` matches exactly one non-empty segment; `**` matches zero or more segments.
/// Everything else is matched literally, segment by segment.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Pattern {
	raw: String,
	segments: Vec<Segment>,
}

#[derive(Clone, PartialEq, Eq, Hash)]
enum Segment {
	Literal(String),
	Any,
	Rest,
}

impl Pattern {
	pub fn new<T: Into<String>>(pattern: T) -> Self {
		let raw = pattern.into();
		debug_assert!(raw.starts_with('/'), "pattern must start with '/'");

		let segments = raw
			.split('/')
			.filter(|s| !s.is_empty())
			.map(|s| match s {
				"*" => Segment::Any,
				"**" => Segment::Rest,
				literal => Segment::Literal(literal.to_string()),
			})
			.collect();

		Self { raw, segments }
	}

	pub fn as_str(&self) -> &str {
		&self.raw
	}

	/// The literal leading portion of the pattern, up to the first wildcard.
	///
	/// Used on the wire: announced paths are sent as suffixes relative to this prefix.
	pub fn prefix(&self) -> String {
		let mut prefix = String::new();
		for segment in &self.segments {
			match segment {
				Segment::Literal(s) => {
					prefix.push('/');
					prefix.push_str(s);
				}
				_ => break,
			}
		}
		if prefix.is_empty() {
			prefix.push('/');
		}
		prefix
	}

	pub fn matches(&self, path: &BroadcastPath) -> bool {
		let segments: Vec<&str> = path.segments().collect();
		Self::matches_inner(&self.segments, &segments)
	}

	/// Capture the wildcard values: one segment per `*`, the joined run per `**`.
	pub fn extract(&self, path: &BroadcastPath) -> Option<Vec<String>> {
		let segments: Vec<&str> = path.segments().collect();
		let mut captures = Vec::new();
		if Self::extract_inner(&self.segments, &segments, &mut captures) {
			Some(captures)
		} else {
			None
		}
	}

	fn matches_inner(pattern: &[Segment], path: &[&str]) -> bool {
		match (pattern.first(), path.first()) {
			(None, None) => true,
			(None, Some(_)) => false,
			(Some(Segment::Literal(lit)), Some(seg)) => lit == seg && Self::matches_inner(&pattern[1..], &path[1..]),
			(Some(Segment::Any), Some(_)) => Self::matches_inner(&pattern[1..], &path[1..]),
			(Some(Segment::Rest), _) => {
				// Try consuming zero segments first, then one more at a time.
				for taken in 0..=path.len() {
					if Self::matches_inner(&pattern[1..], &path[taken..]) {
						return true;
					}
				}
				false
			}
			(Some(_), None) => false,
		}
	}

	fn extract_inner(pattern: &[Segment], path: &[&str], captures: &mut Vec<String>) -> bool {
		match (pattern.first(), path.first()) {
			(None, None) => true,
			(None, Some(_)) => false,
			(Some(Segment::Literal(lit)), Some(seg)) => {
				lit == seg && Self::extract_inner(&pattern[1..], &path[1..], captures)
			}
			(Some(Segment::Any), Some(seg)) => {
				captures.push(seg.to_string());
				if Self::extract_inner(&pattern[1..], &path[1..], captures) {
					return true;
				}
				captures.pop();
				false
			}
			(Some(Segment::Rest), _) => {
				for taken in 0..=path.len() {
					captures.push(path[..taken].join("/"));
					if Self::extract_inner(&pattern[1..], &path[taken..], captures) {
						return true;
					}
					captures.pop();
				}
				false
			}
			(Some(_), None) => false,
		}
	}
}

impl From<&str> for Pattern {
	fn from(pattern: &str) -> Self {
		Self::new(pattern)
	}
}

impl fmt::Display for Pattern {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.raw.fmt(f)
	}
}

impl fmt::Debug for Pattern {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.raw.fmt(f)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn prefix_boundaries() {
		let path = BroadcastPath::new("/room/alice/camera");

		assert!(path.has_prefix("/room"));
		assert!(path.has_prefix("/room/alice"));
		assert!(!path.has_prefix(""));
		assert!(!path.has_prefix("/room/alice/camera"));
		assert!(!path.has_prefix("/room/al"));
	}

	#[test]
	fn strip_prefix_keeps_leading_slash() {
		let path = BroadcastPath::new("/room/alice/camera");

		assert_eq!(path.strip_prefix("/room"), Some("/alice/camera"));
		assert_eq!(path.strip_prefix("/"), Some("/room/alice/camera"));
		assert_eq!(path.strip_prefix("/other"), None);
	}

	#[test]
	fn wildcard_matching() {
		let path = |s: &str| BroadcastPath::new(s);

		assert!(Pattern::new("/a/**").matches(&path("/a")));
		assert!(Pattern::new("/a/**").matches(&path("/a/b/c")));
		assert!(!Pattern::new("/a/*").matches(&path("/a")));
		assert!(Pattern::new("/a/*").matches(&path("/a/b")));
		assert!(!Pattern::new("/a/*").matches(&path("/a/b/c")));
		assert!(Pattern::new("/room/*/camera").matches(&path("/room/alice/camera")));
		assert!(!Pattern::new("/room/*/camera").matches(&path("/room/alice/mic")));
		assert!(Pattern::new("/**/camera").matches(&path("/room/alice/camera")));
	}

	#[test]
	fn extraction() {
		let pattern = Pattern::new("/room/*/device/**");
		let path = BroadcastPath::new("/room/alice/device/cam/front");

		let captures = pattern.extract(&path).unwrap();
		assert_eq!(captures, vec!["alice".to_string(), "cam/front".to_string()]);

		// `**` can match zero segments.
		let path = BroadcastPath::new("/room/bob/device");
		assert_eq!(pattern.extract(&path).unwrap(), vec!["bob".to_string(), "".to_string()]);

		assert!(pattern.extract(&BroadcastPath::new("/other")).is_none());
	}

	#[test]
	fn literal_prefix() {
		assert_eq!(Pattern::new("/a/**").prefix(), "/a");
		assert_eq!(Pattern::new("/a/b/*").prefix(), "/a/b");
		assert_eq!(Pattern::new("/**").prefix(), "/");
		assert_eq!(Pattern::new("/a/b").prefix(), "/a/b");
	}

	#[test]
	fn decode_rejects_unrooted_path() {
		use crate::coding::Encode;
		let buf = "no-slash".encode_bytes();
		let mut read = buf.clone();
		assert!(matches!(
			BroadcastPath::decode(&mut read),
			Err(DecodeError::InvalidPath)
		));
	}
}
