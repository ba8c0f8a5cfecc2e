mod http;

pub use http::HttpPayloadClient;

use arena_domain::repositories::payload::{PayloadLocation, PayloadSource};
use arena_domain::services::retry::RetryPolicy;
use std::fs;
use std::io::Read;
use std::time::Instant;

/// Resolves payload locations against the local process: inline text, stdin,
/// files and HTTP(S) URLs.
pub struct SystemPayloadSource {
    max_bytes: u64,
    http: HttpPayloadClient,
}

impl SystemPayloadSource {
    pub fn new(retry: RetryPolicy, timeout_ms: u64, max_bytes: u64) -> Result<Self, String> {
        Ok(Self {
            max_bytes,
            http: HttpPayloadClient::new(retry, timeout_ms, max_bytes)?,
        })
    }

    fn read_file(&self, path: &std::path::Path) -> Result<String, String> {
        let meta = fs::metadata(path)
            .map_err(|err| format!("failed to read payload file {}: {}", path.display(), err))?;
        if meta.len() > self.max_bytes {
            return Err(format!(
                "payload file {} is {} bytes, limit {}",
                path.display(),
                meta.len(),
                self.max_bytes
            ));
        }
        fs::read_to_string(path)
            .map_err(|err| format!("failed to read payload file {}: {}", path.display(), err))
    }
}

/// Reads at most `max_bytes`; anything longer is an error rather than a truncation.
pub fn read_limited<R: Read>(reader: R, max_bytes: u64, label: &str) -> Result<String, String> {
    let mut buf = String::new();
    reader
        .take(max_bytes.saturating_add(1))
        .read_to_string(&mut buf)
        .map_err(|err| format!("failed to read payload from {label}: {err}"))?;
    if buf.len() as u64 > max_bytes {
        return Err(format!("payload from {label} exceeds {max_bytes} bytes"));
    }
    Ok(buf)
}

fn source_label(location: &PayloadLocation) -> &'static str {
    match location {
        PayloadLocation::Inline(_) => "inline",
        PayloadLocation::Stdin => "stdin",
        PayloadLocation::Http(_) => "http",
        PayloadLocation::File(_) => "file",
    }
}

impl PayloadSource for SystemPayloadSource {
    fn fetch(&self, location: &PayloadLocation) -> Result<String, String> {
        let start = Instant::now();
        let result = match location {
            PayloadLocation::Inline(text) => {
                if text.len() as u64 > self.max_bytes {
                    Err(format!("inline payload exceeds {} bytes", self.max_bytes))
                } else {
                    Ok(text.clone())
                }
            }
            PayloadLocation::Stdin => read_limited(std::io::stdin().lock(), self.max_bytes, "stdin"),
            PayloadLocation::File(path) => self.read_file(path),
            PayloadLocation::Http(url) => self.http.fetch(url),
        };

        let source = source_label(location);
        let result_label = if result.is_ok() { "ok" } else { "err" };
        metrics::counter!(
            "arena.infra.payload.loads_total",
            "source" => source,
            "result" => result_label
        )
        .increment(1);
        metrics::histogram!("arena.infra.payload.load_ms", "source" => source)
            .record(start.elapsed().as_millis() as f64);
        tracing::debug!(
            source,
            location = %location.describe(),
            ok = result.is_ok(),
            "payload fetched"
        );
        result
    }
}
