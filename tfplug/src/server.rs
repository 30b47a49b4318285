//! Server module for running Terraform providers
//!
//! Binds a loopback listener, prints the go-plugin handshake line and serves
//! the tfplugin6 service over TLS.

use crate::error::{Result, TfplugError};
use crate::grpc::GrpcProviderServer;
use crate::proto::provider_server::ProviderServer;
use crate::provider::Provider;
use base64::Engine;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::CertificateDer;
use std::path::PathBuf;
use std::time::Duration;
use tonic::transport::{Certificate, Identity, Server, ServerTlsConfig};

/// Cookie Terraform sets so the binary refuses to run standalone
pub const MAGIC_COOKIE_KEY: &str = "TF_PLUGIN_MAGIC_COOKIE";
pub const MAGIC_COOKIE_VALUE: &str =
    "d602bf8f470bc67ca7faa0386276bbdd4330efaf76d1a219cb4d6991ca9872b2";

const CORE_PROTOCOL_VERSION: u32 = 1;
const PROTOCOL_VERSION: u32 = 6;

/// Server configuration for running a Terraform provider
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Path to TLS certificate file
    pub cert_path: PathBuf,
    /// Path to TLS key file
    pub key_path: PathBuf,
    /// Maximum message size in bytes
    pub max_message_size: usize,
    /// Refuse to start unless Terraform's magic cookie is present
    pub require_magic_cookie: bool,
    /// Timeout for graceful shutdown
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            cert_path: PathBuf::from("./certs/localhost.pem"),
            key_path: PathBuf::from("./certs/localhost-key.pem"),
            max_message_size: 256 << 20, // 256MB
            require_magic_cookie: true,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by TF_PLUGIN_CERT_PATH / TF_PLUGIN_KEY_PATH
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(path) = std::env::var("TF_PLUGIN_CERT_PATH") {
            config.cert_path = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("TF_PLUGIN_KEY_PATH") {
            config.key_path = PathBuf::from(path);
        }
        config
    }

    pub fn with_cert_path(mut self, path: PathBuf) -> Self {
        self.cert_path = path;
        self
    }

    pub fn with_key_path(mut self, path: PathBuf) -> Self {
        self.key_path = path;
        self
    }

    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Allow running without Terraform (debugging)
    pub fn without_magic_cookie(mut self) -> Self {
        self.require_magic_cookie = false;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

/// Formats the line go-plugin reads from stdout
pub fn handshake_line(addr: &std::net::SocketAddr, cert_der: &[u8]) -> String {
    format!(
        "{}|{}|tcp|{}|grpc|{}",
        CORE_PROTOCOL_VERSION,
        PROTOCOL_VERSION,
        addr,
        base64::engine::general_purpose::STANDARD_NO_PAD.encode(cert_der)
    )
}

fn first_certificate_der(pem: &[u8]) -> Result<Vec<u8>> {
    let cert = CertificateDer::from_pem_slice(pem)
        .map_err(|e| TfplugError::TlsError(format!("Failed to parse certificate: {}", e)))?;
    Ok(cert.as_ref().to_vec())
}

/// Main entry point for running a provider
pub async fn serve<P: Provider + 'static>(provider: P, config: ServerConfig) -> Result<()> {
    if config.require_magic_cookie
        && std::env::var(MAGIC_COOKIE_KEY).ok().as_deref() != Some(MAGIC_COOKIE_VALUE)
    {
        return Err(TfplugError::HandshakeError(
            "This binary is a plugin. It is not meant to be executed directly; \
             run it through Terraform instead"
                .to_string(),
        ));
    }

    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let grpc_server = GrpcProviderServer::new(provider);
    let root = grpc_server.root_context();
    let provider_service = ProviderServer::new(grpc_server)
        .max_decoding_message_size(config.max_message_size)
        .max_encoding_message_size(config.max_message_size);

    let cert = tokio::fs::read(&config.cert_path)
        .await
        .map_err(|e| TfplugError::TlsError(format!("Failed to read certificate: {}", e)))?;

    let key = tokio::fs::read(&config.key_path)
        .await
        .map_err(|e| TfplugError::TlsError(format!("Failed to read key: {}", e)))?;

    let cert_der = first_certificate_der(&cert)?;
    let mut tls_config = ServerTlsConfig::new().identity(Identity::from_pem(&cert, key));

    // Terraform's AutoMTLS hands over the client certificate to trust
    if let Ok(client_cert) = std::env::var("PLUGIN_CLIENT_CERT") {
        tls_config = tls_config.client_ca_root(Certificate::from_pem(client_cert));
    }

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!(address = %actual_addr, "provider server listening");
    println!("{}", handshake_line(&actual_addr, &cert_der));

    let server = Server::builder()
        .tls_config(tls_config)?
        .add_service(provider_service);

    let incoming = tokio_stream::wrappers::TcpListenerStream::new(listener);
    let shutdown_timeout = config.shutdown_timeout;
    server
        .serve_with_incoming_shutdown(incoming, async move {
            root.cancelled().await;
            // Give in-flight requests a chance to observe cancellation
            tokio::time::sleep(shutdown_timeout.min(Duration::from_secs(1))).await;
        })
        .await?;

    Ok(())
}

/// Convenience function to run a provider with configuration from the environment
pub async fn serve_default<P: Provider + 'static>(provider: P) -> Result<()> {
    serve(provider, ServerConfig::from_env()).await
}
