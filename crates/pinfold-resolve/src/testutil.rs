//! Shared test helper: a minimal canned-response HTTP server, in the
//! same spirit as the hand-rolled mock used by the fetch crate's tests.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};

pub(crate) struct MockServer {
    /// Base URL, e.g. `http://127.0.0.1:PORT`.
    pub addr: String,
    /// Host part only, e.g. `127.0.0.1:PORT` (module paths embed this).
    pub host: String,
    /// Request paths (including query strings) in arrival order.
    pub requests: Arc<Mutex<Vec<String>>>,
    _handle: std::thread::JoinHandle<()>,
}

impl MockServer {
    /// Serve a fixed path → (status, body) table. Paths are matched
    /// verbatim against the request target, query string included.
    pub fn start(routes: &[(&str, u16, &[u8])]) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let local = listener.local_addr().unwrap();
        let routes: HashMap<String, (u16, Vec<u8>)> = routes
            .iter()
            .map(|(p, s, b)| ((*p).to_owned(), (*s, b.to_vec())))
            .collect();
        Self::serve(listener, local, routes)
    }

    /// Like [`start`], but bodies are text templates where `{host}` is
    /// replaced by the server's own `127.0.0.1:PORT`. Needed when the
    /// served content must reference the server itself.
    pub fn start_templated(routes: &[(&str, u16, &str)]) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let local = listener.local_addr().unwrap();
        let host = local.to_string();
        let routes: HashMap<String, (u16, Vec<u8>)> = routes
            .iter()
            .map(|(p, s, b)| ((*p).to_owned(), (*s, b.replace("{host}", &host).into_bytes())))
            .collect();
        Self::serve(listener, local, routes)
    }

    fn serve(
        listener: TcpListener,
        local: std::net::SocketAddr,
        routes: HashMap<String, (u16, Vec<u8>)>,
    ) -> Self {
        let requests: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requests);

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
                }
                seen.lock().unwrap().push(path.clone());
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
            addr: format!("http://{local}"),
            host: local.to_string(),
            requests,
            _handle: handle,
        }
    }

    /// Number of requests seen for a given path.
    pub fn hits(&self, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.as_str() == path)
            .count()
    }
}
