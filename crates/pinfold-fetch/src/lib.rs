//! Content locator: the atomic primitive every resolver builds on.
//!
//! A single blocking HTTP GET turns a URL into verified bytes; pairing
//! the URL with a strong digest of those exact bytes yields an
//! immutable, offline-verifiable source reference. Failures are never
//! retried: a reproducible manifest requires the upstream resource to
//! exist at generation time, so any fetch error is fatal to the run.
//!
//! The `ureq` agent is built without transparent decompression, so the
//! digest always covers the literal transport bytes the sandboxed
//! builder will later re-fetch and store.

use sha2::{Digest as _, Sha256, Sha512};
use std::io::Read;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {code} for {url}")]
    Status { code: u16, url: String },
    #[error("transport error for {url}: {reason}")]
    Transport { url: String, reason: String },
    #[error("response from {url} is not valid UTF-8")]
    NotText { url: String },
}

/// A URL pinned to the sha-512 of the bytes it served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinnedUrl {
    pub url: String,
    pub sha512: String,
}

const BODY_LIMIT: u64 = 1024 * 1024 * 1024;

/// Blocking HTTP fetcher shared by all resolvers.
pub struct Fetcher {
    agent: ureq::Agent,
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher {
    pub fn new() -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
        }
    }

    /// Perform one GET and return the response body bytes.
    ///
    /// Any non-success status or transport failure is an error; there
    /// is no retry.
    pub fn fetch(&self, url: &str, headers: &[(&str, &str)]) -> Result<Vec<u8>, FetchError> {
        tracing::debug!("GET {url}");
        let mut req = self.agent.get(url);
        for (name, value) in headers {
            req = req.header(*name, *value);
        }
        let resp = match req.call() {
            Ok(r) => r,
            Err(ureq::Error::StatusCode(code)) => {
                return Err(FetchError::Status {
                    code,
                    url: url.to_owned(),
                });
            }
            Err(e) => {
                return Err(FetchError::Transport {
                    url: url.to_owned(),
                    reason: e.to_string(),
                });
            }
        };

        let code = resp.status().as_u16();
        if !(200..300).contains(&code) {
            return Err(FetchError::Status {
                code,
                url: url.to_owned(),
            });
        }

        // Toolchain tarballs run well past the default body limit.
        let mut body = Vec::new();
        resp.into_body()
            .into_with_config()
            .limit(BODY_LIMIT)
            .reader()
            .read_to_end(&mut body)
            .map_err(|e| FetchError::Transport {
                url: url.to_owned(),
                reason: e.to_string(),
            })?;
        Ok(body)
    }

    /// Fetch and decode as UTF-8 text.
    pub fn fetch_text(&self, url: &str, headers: &[(&str, &str)]) -> Result<String, FetchError> {
        let body = self.fetch(url, headers)?;
        String::from_utf8(body).map_err(|_| FetchError::NotText {
            url: url.to_owned(),
        })
    }

    /// Fetch a binary artifact and pin it to the sha-512 of the exact
    /// bytes served.
    pub fn locate_sha512(&self, url: &str) -> Result<PinnedUrl, FetchError> {
        let body = self.fetch(url, &[("Accept", "application/octet-stream")])?;
        Ok(PinnedUrl {
            url: url.to_owned(),
            sha512: sha512_hex(&body),
        })
    }
}

pub fn sha512_hex(bytes: &[u8]) -> String {
    hex::encode(Sha512::digest(bytes))
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::sync::{Arc, Mutex};

    struct MockServer {
        addr: String,
        _handle: std::thread::JoinHandle<()>,
        headers_seen: Arc<Mutex<Vec<String>>>,
    }

    impl MockServer {
        /// Serve a fixed path → (status, body) table, recording request
        /// header lines for inspection.
        fn start(routes: HashMap<String, (u16, Vec<u8>)>) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let addr = format!("http://{}", listener.local_addr().unwrap());
            let headers_seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
            let seen = Arc::clone(&headers_seen);

            let handle = std::thread::spawn(move || {
                for stream in listener.incoming() {
                    let Ok(mut stream) = stream else { break };
                    let mut reader = BufReader::new(stream.try_clone().unwrap());
                    let mut request_line = String::new();
                    if reader.read_line(&mut request_line).is_err() {
                        continue;
                    }
                    let path = request_line
                        .split_whitespace()
                        .nth(1)
                        .unwrap_or("/")
                        .to_owned();
                    loop {
                        let mut line = String::new();
                        if reader.read_line(&mut line).is_err() || line.trim().is_empty() {
                            break;
                        }
                        seen.lock().unwrap().push(line.trim().to_owned());
                    }
                    let (status, body) = routes
                        .get(&path)
                        .cloned()
                        .unwrap_or((404, b"not found".to_vec()));
                    let reason = if status == 200 { "OK" } else { "Error" };
                    let _ = write!(
                        stream,
                        "HTTP/1.1 {status} {reason}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        body.len()
                    );
                    let _ = stream.write_all(&body);
                    let _ = stream.flush();
                }
            });

            MockServer {
                addr,
                _handle: handle,
                headers_seen,
            }
        }
    }

    fn routes(entries: &[(&str, u16, &[u8])]) -> HashMap<String, (u16, Vec<u8>)> {
        entries
            .iter()
            .map(|(p, s, b)| ((*p).to_owned(), (*s, b.to_vec())))
            .collect()
    }

    #[test]
    fn fetch_returns_exact_bytes() {
        let server = MockServer::start(routes(&[("/blob", 200, b"exact bytes")]));
        let fetcher = Fetcher::new();
        let body = fetcher.fetch(&format!("{}/blob", server.addr), &[]).unwrap();
        assert_eq!(body, b"exact bytes");
    }

    #[test]
    fn locate_pins_digest_of_served_bytes() {
        let payload = b"tarball contents";
        let server = MockServer::start(routes(&[("/pkg.tgz", 200, payload)]));
        let fetcher = Fetcher::new();
        let url = format!("{}/pkg.tgz", server.addr);
        let pinned = fetcher.locate_sha512(&url).unwrap();
        assert_eq!(pinned.url, url);
        assert_eq!(pinned.sha512, sha512_hex(payload));
        assert_eq!(pinned.sha512.len(), 128);
    }

    #[test]
    fn locate_sends_octet_stream_accept_header() {
        let server = MockServer::start(routes(&[("/pkg", 200, b"x")]));
        let fetcher = Fetcher::new();
        fetcher
            .locate_sha512(&format!("{}/pkg", server.addr))
            .unwrap();
        std::thread::sleep(std::time::Duration::from_millis(50));
        let headers = server.headers_seen.lock().unwrap();
        assert!(
            headers
                .iter()
                .any(|h| h.eq_ignore_ascii_case("accept: application/octet-stream")),
            "Accept header missing: {headers:?}"
        );
    }

    #[test]
    fn non_success_status_is_fatal() {
        let server = MockServer::start(routes(&[("/gone", 404, b"nope")]));
        let fetcher = Fetcher::new();
        let err = fetcher
            .fetch(&format!("{}/gone", server.addr), &[])
            .unwrap_err();
        assert!(matches!(err, FetchError::Status { code: 404, .. }));
    }

    #[test]
    fn server_error_status_is_fatal() {
        let server = MockServer::start(routes(&[("/boom", 500, b"oops")]));
        let fetcher = Fetcher::new();
        let err = fetcher
            .fetch(&format!("{}/boom", server.addr), &[])
            .unwrap_err();
        assert!(matches!(err, FetchError::Status { code: 500, .. }));
    }

    #[test]
    fn connection_refused_is_transport_error() {
        let fetcher = Fetcher::new();
        let err = fetcher.fetch("http://127.0.0.1:1/nothing", &[]).unwrap_err();
        assert!(matches!(err, FetchError::Transport { .. }));
    }

    #[test]
    fn fetch_text_rejects_invalid_utf8() {
        let server = MockServer::start(routes(&[("/bin", 200, &[0xff, 0xfe, 0x00])]));
        let fetcher = Fetcher::new();
        let err = fetcher
            .fetch_text(&format!("{}/bin", server.addr), &[])
            .unwrap_err();
        assert!(matches!(err, FetchError::NotText { .. }));
    }

    #[test]
    fn sha512_matches_known_vector() {
        // NIST test vector for "abc".
        assert_eq!(
            sha512_hex(b"abc"),
            "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a\
             2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f"
        );
    }

    #[test]
    fn sha256_matches_known_vector() {
        // NIST test vector for "abc".
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
