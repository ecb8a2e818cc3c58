use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use url::Url;

use crate::quic::{self, RawQuic};

/// TLS options for outgoing connections.
#[derive(Default)]
pub struct ClientTls {
	/// Skip certificate verification; local development only.
	pub disable_verify: bool,
}

/// Dials sessions by URL.
pub struct Client {
	/// The local address to bind to.
	pub bind: SocketAddr,
	pub tls: ClientTls,
}

impl Default for Client {
	fn default() -> Self {
		Self {
			bind: "[::]:0".parse().expect("valid address"),
			tls: ClientTls::default(),
		}
	}
}

impl Client {
	/// Connect by URL: `https` dials WebTransport, `moqt` dials raw QUIC.
	///
	/// The URL path becomes the session path either way.
	pub async fn dial(&self, url: Url, mux: moqt::TrackMux) -> anyhow::Result<moqt::Session> {
		match url.scheme() {
			"https" => self.dial_web_transport(url, mux).await,
			"moqt" => self.dial_quic(url, mux).await,
			scheme => anyhow::bail!("unsupported scheme: {scheme}"),
		}
	}

	async fn dial_web_transport(&self, url: Url, mux: moqt::TrackMux) -> anyhow::Result<moqt::Session> {
		let builder = web_transport_quinn::ClientBuilder::new();
		let client = if self.tls.disable_verify {
			builder.dangerous().with_no_certificate_verification()?
		} else {
			builder.with_system_roots()?
		};

		let path = url.path().to_string();
		let transport = client.connect(url).await.context("webtransport handshake failed")?;

		moqt::Session::connect(transport, Some(path), mux)
			.await
			.context("session handshake failed")
	}

	async fn dial_quic(&self, url: Url, mux: moqt::TrackMux) -> anyhow::Result<moqt::Session> {
		let host = url.host_str().context("missing host")?.to_string();
		let port = url.port().unwrap_or(443);

		let addr = tokio::net::lookup_host((host.as_str(), port))
			.await?
			.next()
			.context("no addresses resolved")?;

		let mut tls = if self.tls.disable_verify {
			let provider = rustls::crypto::CryptoProvider::get_default()
				.cloned()
				.unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()));
			rustls::ClientConfig::builder()
				.dangerous()
				.with_custom_certificate_verifier(Arc::new(NoVerify(provider)))
				.with_no_client_auth()
		} else {
			let mut roots = rustls::RootCertStore::empty();
			for cert in rustls_native_certs::load_native_certs().certs {
				let _ = roots.add(cert);
			}
			rustls::ClientConfig::builder()
				.with_root_certificates(roots)
				.with_no_client_auth()
		};
		tls.alpn_protocols = vec![quic::ALPN.to_vec()];

		let config = quinn::crypto::rustls::QuicClientConfig::try_from(tls)?;
		let mut endpoint = quinn::Endpoint::client(self.bind)?;
		endpoint.set_default_client_config(quinn::ClientConfig::new(Arc::new(config)));

		let connection = endpoint.connect(addr, &host)?.await?;
		tracing::debug!(%url, "raw QUIC connected");

		moqt::Session::connect(RawQuic::new(connection), Some(url.path().to_string()), mux)
			.await
			.context("session handshake failed")
	}
}

#[derive(Debug)]
struct NoVerify(Arc<rustls::crypto::CryptoProvider>);

impl rustls::client::danger::ServerCertVerifier for NoVerify {
	fn verify_server_cert(
		&self,
		_end_entity: &rustls::pki_types::CertificateDer<'_>,
		_intermediates: &[rustls::pki_types::CertificateDer<'_>],
		_server_name: &rustls::pki_types::ServerName<'_>,
		_ocsp_response: &[u8],
		_now: rustls::pki_types::UnixTime,
	) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
		Ok(rustls::client::danger::ServerCertVerified::assertion())
	}

	fn verify_tls12_signature(
		&self,
		message: &[u8],
		cert: &rustls::pki_types::CertificateDer<'_>,
		dss: &rustls::DigitallySignedStruct,
	) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
		rustls::crypto::verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
	}

	fn verify_tls13_signature(
		&self,
		message: &[u8],
		cert: &rustls::pki_types::CertificateDer<'_>,
		dss: &rustls::DigitallySignedStruct,
	) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
		rustls::crypto::verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
	}

	fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
		self.0.signature_verification_algorithms.supported_schemes()
	}
}
