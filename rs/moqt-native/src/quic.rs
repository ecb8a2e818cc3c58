use bytes::{Buf, BufMut, Bytes};

/// The ALPN for raw QUIC sessions, negotiated without a WebTransport handshake.
pub const ALPN: &[u8] = b"moq-00";

/// A [web_transport_trait::Session] over a bare QUIC connection.
///
/// There is no CONNECT request or HTTP/3 framing; QUIC streams map one to one.
/// The session path travels in the setup parameters instead of a URL.
#[derive(Clone)]
pub struct RawQuic {
	conn: quinn::Connection,
}

impl RawQuic {
	pub fn new(conn: quinn::Connection) -> Self {
		Self { conn }
	}
}

impl web_transport_trait::Session for RawQuic {
	type SendStream = RawSend;
	type RecvStream = RawRecv;
	type Error = web_transport_quinn::SessionError;

	async fn open_bi(&self) -> Result<(Self::SendStream, Self::RecvStream), Self::Error> {
		let (send, recv) = self.conn.open_bi().await?;
		Ok((RawSend(send), RawRecv(recv)))
	}

	async fn open_uni(&self) -> Result<Self::SendStream, Self::Error> {
		Ok(RawSend(self.conn.open_uni().await?))
	}

	async fn accept_bi(&self) -> Result<(Self::SendStream, Self::RecvStream), Self::Error> {
		let (send, recv) = self.conn.accept_bi().await?;
		Ok((RawSend(send), RawRecv(recv)))
	}

	async fn accept_uni(&self) -> Result<Self::RecvStream, Self::Error> {
		Ok(RawRecv(self.conn.accept_uni().await?))
	}

	fn send_datagram(&self, payload: Bytes) -> Result<(), Self::Error> {
		self.conn.send_datagram(payload)?;
		Ok(())
	}

	async fn recv_datagram(&self) -> Result<Bytes, Self::Error> {
		Ok(self.conn.read_datagram().await?)
	}

	fn max_datagram_size(&self) -> usize {
		self.conn.max_datagram_size().unwrap_or_default()
	}

	fn close(&self, code: u32, reason: &str) {
		self.conn.close(quinn::VarInt::from_u32(code), reason.as_bytes());
	}

	async fn closed(&self) -> Self::Error {
		self.conn.closed().await.into()
	}
}

pub struct RawSend(quinn::SendStream);

impl web_transport_trait::SendStream for RawSend {
	type Error = web_transport_quinn::WriteError;

	async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
		Ok(self.0.write(buf).await?)
	}

	async fn write_buf<B: Buf + Send>(&mut self, buf: &mut B) -> Result<usize, Self::Error> {
		let size = self.0.write(buf.chunk()).await?;
		buf.advance(size);
		Ok(size)
	}

	fn finish(&mut self) -> Result<(), Self::Error> {
		self.0.finish().map_err(|_| web_transport_quinn::WriteError::ClosedStream)
	}

	fn reset(&mut self, code: u32) {
		let _ = self.0.reset(quinn::VarInt::from_u32(code));
	}

	fn set_priority(&mut self, priority: u8) {
		// Lower values are more urgent, but quinn sends higher values first.
		let _ = self.0.set_priority(-(priority as i32));
	}

	async fn closed(&mut self) -> Result<(), Self::Error> {
		match self.0.stopped().await {
			Ok(_) => Ok(()),
			Err(quinn::StoppedError::ConnectionLost(err)) => Err(quinn::WriteError::ConnectionLost(err).into()),
			Err(quinn::StoppedError::ZeroRttRejected) => Err(quinn::WriteError::ZeroRttRejected.into()),
		}
	}
}

pub struct RawRecv(quinn::RecvStream);

impl web_transport_trait::RecvStream for RawRecv {
	type Error = web_transport_quinn::ReadError;

	async fn read(&mut self, dst: &mut [u8]) -> Result<Option<usize>, Self::Error> {
		Ok(self.0.read(dst).await?)
	}

	async fn read_buf<B: BufMut + Send>(&mut self, buf: &mut B) -> Result<Option<usize>, Self::Error> {
		let chunk = match self.0.read_chunk(buf.remaining_mut(), true).await? {
			Some(chunk) => chunk,
			None => return Ok(None),
		};
		let size = chunk.bytes.len();
		buf.put_slice(&chunk.bytes);
		Ok(Some(size))
	}

	async fn read_chunk(&mut self, max: usize) -> Result<Option<Bytes>, Self::Error> {
		Ok(self.0.read_chunk(max, true).await?.map(|chunk| chunk.bytes))
	}

	fn stop(&mut self, code: u32) {
		let _ = self.0.stop(quinn::VarInt::from_u32(code));
	}

	async fn closed(&mut self) -> Result<(), Self::Error> {
		match self.0.received_reset().await {
			Ok(_) => Ok(()),
			Err(err) => Err(quinn::ReadError::from(err).into()),
		}
	}
}
