use crate::{config::Config, errors::WhoisError};
use async_trait::async_trait;
use std::time::Duration;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::timeout,
};
use tracing::debug;

/// One raw request/response exchange with a whois server.
///
/// Implementations never retry and never interpret the response.
#[async_trait]
pub trait WhoisTransport: Send + Sync {
    async fn query(&self, domain: &str) -> Result<String, WhoisError>;
}

/// Plain TCP whois client bound to a single server.
#[derive(Debug, Clone)]
pub struct TcpWhoisTransport {
    server: String,
    port: u16,
    timeout: Duration,
    max_response_size: usize,
    buffer_size: usize,
}

impl TcpWhoisTransport {
    pub fn new(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            port: config.port,
            timeout: config.whois_timeout(),
            max_response_size: config.max_response_size,
            buffer_size: config.buffer_size.max(512),
        }
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    async fn execute_whois_query(&self, query: &str) -> Result<String, WhoisError> {
        let mut stream = timeout(
            self.timeout,
            TcpStream::connect((self.server.as_str(), self.port))
        ).await??;

        if let Err(e) = stream.set_nodelay(true) {
            debug!("Failed to set TCP_NODELAY: {}", e);
        }

        let query_line = format!("{}\r\n", query);
        stream.write_all(query_line.as_bytes()).await?;

        let mut buffer = vec![0u8; self.buffer_size];
        let mut response = Vec::new();

        loop {
            match timeout(self.timeout, stream.read(&mut buffer)).await? {
                Ok(0) => break, // EOF
                Ok(n) => {
                    response.extend_from_slice(&buffer[..n]);
                    if response.len() > self.max_response_size {
                        return Err(WhoisError::ResponseTooLarge);
                    }
                }
                Err(e) => {
                    return Err(WhoisError::IoError(e));
                }
            }
        }

        debug!("Received {} bytes from {} for {}", response.len(), self.server, query);
        Ok(decode_response(response))
    }
}

/// Whois has no declared charset: take UTF-8 when valid, otherwise Latin-1.
fn decode_response(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => {
            debug!("Response is not valid UTF-8, decoding as Latin-1");
            err.into_bytes().into_iter().map(char::from).collect()
        }
    }
}

#[async_trait]
impl WhoisTransport for TcpWhoisTransport {
    async fn query(&self, domain: &str) -> Result<String, WhoisError> {
        let domain = domain.trim();
        if domain.is_empty() || domain.contains(char::is_whitespace) {
            return Err(WhoisError::InvalidDomain(domain.to_string()));
        }

        self.execute_whois_query(domain).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::{io::AsyncBufReadExt, net::TcpListener};
    use tokio_test::{assert_err, assert_ok};

    fn transport_for(port: u16) -> TcpWhoisTransport {
        let config = Config {
            server: "127.0.0.1".to_string(),
            port,
            whois_timeout_seconds: 5,
            max_response_size: 64,
            ..Config::default()
        };
        TcpWhoisTransport::new(&config)
    }

    /// Serves one connection: reads the query line, answers with `reply(query)`.
    async fn serve_once<F>(reply: F) -> u16
    where
        F: FnOnce(String) -> String + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut reader = tokio::io::BufReader::new(socket);
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            let body = reply(line);
            // The client may hang up early on oversized replies
            let _ = reader.get_mut().write_all(body.as_bytes()).await;
            let _ = reader.get_mut().shutdown().await;
        });
        port
    }

    #[tokio::test]
    async fn test_query_sends_crlf_line_and_reads_to_eof() {
        let port = serve_once(|line| format!("echo:{}", line)).await;
        let raw = assert_ok!(transport_for(port).query("rezo.net").await);
        assert_eq!(raw, "echo:rezo.net\r\n");
    }

    #[tokio::test]
    async fn test_latin1_response_decoded() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut line = [0u8; 64];
            let _ = socket.read(&mut line).await;
            let _ = socket
                .write_all(b"Registrar: GANDI SAS\r\nRegistrant Organization: R\xe9seau\r\n")
                .await;
        });

        let raw = assert_ok!(transport_for(port).query("rezo.net").await);
        assert_eq!(raw, "Registrar: GANDI SAS\r\nRegistrant Organization: Réseau\r\n");
    }

    #[test]
    fn test_decode_prefers_utf8() {
        assert_eq!(decode_response("Réseau".as_bytes().to_vec()), "Réseau");
        assert_eq!(decode_response(vec![b'R', 0xe9]), "Ré");
    }

    #[tokio::test]
    async fn test_oversized_response_rejected() {
        let port = serve_once(|_| "x".repeat(1024)).await;
        let err = assert_err!(transport_for(port).query("rezo.net").await);
        assert!(matches!(err, WhoisError::ResponseTooLarge));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_connection_refused_is_retryable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = transport_for(port).query("rezo.net").await.unwrap_err();
        assert!(err.is_retryable(), "unexpected error: {}", err);
    }

    #[tokio::test]
    async fn test_invalid_domain_not_sent() {
        let err = transport_for(1).query("  ").await.unwrap_err();
        assert!(matches!(err, WhoisError::InvalidDomain(_)));
    }
}
