use std::fs;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use crate::quic::{self, RawQuic};

/// The certificate chain and private key used for incoming connections.
pub struct ServerTls {
	/// A PEM file with the certificate chain.
	pub cert: PathBuf,
	/// A PEM file with the private key.
	pub key: PathBuf,
}

/// Accepts sessions over WebTransport and raw QUIC on one UDP port.
pub struct Server {
	pub bind: SocketAddr,
	pub tls: ServerTls,
	/// Served to every accepted session.
	pub mux: moqt::TrackMux,
}

impl Server {
	/// Bind the endpoint and serve connections until the process exits.
	pub async fn listen_and_serve(self) -> anyhow::Result<()> {
		let chain = {
			let mut reader = io::BufReader::new(fs::File::open(&self.tls.cert).context("failed to open certificate")?);
			rustls_pemfile::certs(&mut reader)
				.collect::<Result<Vec<_>, _>>()
				.context("failed to parse certificate chain")?
		};
		let key = {
			let mut reader = io::BufReader::new(fs::File::open(&self.tls.key).context("failed to open private key")?);
			rustls_pemfile::private_key(&mut reader)?.context("no private key found")?
		};

		let mut tls = rustls::ServerConfig::builder()
			.with_no_client_auth()
			.with_single_cert(chain, key)?;
		tls.alpn_protocols = vec![web_transport_quinn::ALPN.as_bytes().to_vec(), quic::ALPN.to_vec()];

		let config = quinn::crypto::rustls::QuicServerConfig::try_from(tls)?;
		let endpoint = quinn::Endpoint::server(quinn::ServerConfig::with_crypto(Arc::new(config)), self.bind)?;

		tracing::info!(addr = %self.bind, "listening");

		let mut next_id: u64 = 0;
		while let Some(incoming) = endpoint.accept().await {
			let id = next_id;
			next_id += 1;

			let mux = self.mux.clone();
			tokio::spawn(async move {
				if let Err(err) = serve(incoming, mux, id).await {
					tracing::warn!(id, %err, "connection failed");
				}
			});
		}

		Ok(())
	}
}

async fn serve(incoming: quinn::Incoming, mux: moqt::TrackMux, id: u64) -> anyhow::Result<()> {
	let connection = incoming.await?;
	let alpn = alpn(&connection)?;

	tracing::debug!(id, alpn = %String::from_utf8_lossy(&alpn), "accepted connection");

	let session = match alpn.as_slice() {
		quic::ALPN => moqt::Session::accept_raw(RawQuic::new(connection), mux).await?,
		alpn if alpn == web_transport_quinn::ALPN.as_bytes() => {
			let request = web_transport_quinn::Request::accept(connection)
				.await
				.context("webtransport handshake failed")?;
			tracing::debug!(id, url = %request.url(), "webtransport request");
			let transport = request.ok().await.context("failed to respond to request")?;
			moqt::Session::accept(transport, mux).await?
		}
		other => anyhow::bail!("unknown ALPN: {:?}", String::from_utf8_lossy(other)),
	};

	// The session runs itself; wait for it to end.
	session.context().done().await;
	tracing::debug!(id, "connection closed");
	Ok(())
}

fn alpn(connection: &quinn::Connection) -> anyhow::Result<Vec<u8>> {
	let data = connection.handshake_data().context("missing handshake data")?;
	let data = data
		.downcast::<quinn::crypto::rustls::HandshakeData>()
		.ok()
		.context("unexpected handshake data")?;
	data.protocol.context("no ALPN negotiated")
}
