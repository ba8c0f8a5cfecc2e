use super::read_limited;
use arena_domain::services::retry::RetryPolicy;
use reqwest::blocking::Client;
use std::time::{Duration, Instant};

/// Blocking GET with linear backoff on HTTP 429.
pub struct HttpPayloadClient {
    retry: RetryPolicy,
    max_bytes: u64,
    client: Client,
}

impl HttpPayloadClient {
    pub fn new(retry: RetryPolicy, timeout_ms: u64, max_bytes: u64) -> Result<Self, String> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|err| format!("failed to build http client: {err}"))?;
        Ok(Self {
            retry,
            max_bytes,
            client,
        })
    }

    pub fn fetch(&self, url: &str) -> Result<String, String> {
        let span = tracing::info_span!(
            "infra.payload.http",
            url = %url,
            max_attempts = self.retry.max_attempts,
            base_delay_ms = self.retry.base_delay_ms
        );
        let _enter = span.enter();

        let start = Instant::now();
        let mut attempt = 0u32;
        let result = loop {
            attempt += 1;
            let response = match self.client.get(url).send() {
                Ok(response) => response,
                Err(err) => break Err(format!("payload request to {url} failed: {err}")),
            };
            let status = response.status().as_u16();
            if response.status().is_success() {
                break read_limited(response, self.max_bytes, url);
            }
            if self.retry.should_retry(status, attempt) {
                let delay = self.retry.delay_for(attempt);
                metrics::counter!("arena.infra.payload.retries_total").increment(1);
                tracing::warn!(
                    attempt,
                    status,
                    delay_ms = delay.as_millis() as u64,
                    "payload request rate limited, backing off"
                );
                std::thread::sleep(delay);
                continue;
            }
            break Err(format!(
                "payload request to {url} failed: status {status} after {attempt} attempt(s)"
            ));
        };

        metrics::histogram!("arena.infra.payload.attempts").record(f64::from(attempt));
        metrics::histogram!("arena.infra.payload.http_ms")
            .record(start.elapsed().as_millis() as f64);
        if let Err(err) = &result {
            tracing::warn!(attempts = attempt, error = %err, "payload request failed");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::HttpPayloadClient;
    use arena_domain::services::retry::RetryPolicy;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    struct ScriptedServer {
        base_url: String,
        hits: Arc<AtomicUsize>,
        handle: Option<thread::JoinHandle<()>>,
    }

    impl ScriptedServer {
        /// Answers exactly one connection per scripted response, then exits.
        fn start(responses: Vec<(u16, &'static str)>) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock server");
            let addr = listener.local_addr().expect("local addr");
            let hits = Arc::new(AtomicUsize::new(0));
            let hits_clone = hits.clone();
            let handle = thread::spawn(move || {
                for (status, body) in responses {
                    let Ok((mut stream, _)) = listener.accept() else {
                        return;
                    };
                    let _ = read_request(&mut stream);
                    hits_clone.fetch_add(1, Ordering::SeqCst);
                    let _ = write_response(&mut stream, status, body);
                }
            });
            Self {
                base_url: format!("http://{addr}"),
                hits,
                handle: Some(handle),
            }
        }

        fn finish(mut self) -> usize {
            if let Some(handle) = self.handle.take() {
                let _ = handle.join();
            }
            self.hits.load(Ordering::SeqCst)
        }
    }

    fn read_request(stream: &mut TcpStream) -> std::io::Result<()> {
        let mut buf = [0u8; 1024];
        let mut seen = Vec::new();
        loop {
            let n = stream.read(&mut buf)?;
            if n == 0 {
                return Ok(());
            }
            seen.extend_from_slice(&buf[..n]);
            if seen.windows(4).any(|w| w == b"\r\n\r\n") {
                return Ok(());
            }
        }
    }

    fn write_response(stream: &mut TcpStream, status: u16, body: &str) -> std::io::Result<()> {
        let reason = match status {
            200 => "OK",
            429 => "Too Many Requests",
            _ => "Internal Server Error",
        };
        let response = format!(
            "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes())?;
        stream.flush()
    }

    fn client(max_attempts: u32) -> HttpPayloadClient {
        HttpPayloadClient::new(
            RetryPolicy::new(max_attempts, 1).expect("policy"),
            2_000,
            1024,
        )
        .expect("client")
    }

    #[test]
    fn retries_rate_limited_requests_then_succeeds() {
        let server = ScriptedServer::start(vec![
            (429, "{}"),
            (429, "{}"),
            (200, r#"{"returns":[0.01]}"#),
        ]);
        let url = format!("{}/payload.json", server.base_url);
        let body = client(3).fetch(&url).expect("payload");
        assert_eq!(body, r#"{"returns":[0.01]}"#);
        assert_eq!(server.finish(), 3);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let server = ScriptedServer::start(vec![(429, "{}"), (429, "{}")]);
        let url = format!("{}/payload.json", server.base_url);
        let err = client(2).fetch(&url).expect_err("rate limited");
        assert!(err.contains("status 429 after 2 attempt(s)"));
        assert_eq!(server.finish(), 2);
    }

    #[test]
    fn other_errors_fail_immediately() {
        let server = ScriptedServer::start(vec![(500, "boom")]);
        let url = format!("{}/payload.json", server.base_url);
        let err = client(5).fetch(&url).expect_err("server error");
        assert!(err.contains("status 500 after 1 attempt(s)"));
        assert_eq!(server.finish(), 1);
    }
}
