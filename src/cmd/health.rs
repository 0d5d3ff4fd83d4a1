//! `mcpo-guard health` — check the health of a running instance.
//!
//! Sends a `GET /health` request to the specified URL and displays the
//! response as formatted text or raw JSON, including the correlation id
//! the server assigned to the check.

use http_body_util::BodyExt;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::cli::HealthArgs;
use crate::context::{REQUEST_ID_HEADER, USER_HEADER};
use crate::error::McpoError;
use crate::health::HealthResponse;

const HEALTH_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

pub async fn execute(args: HealthArgs) -> Result<(), McpoError> {
    let url = format!("{}/health", args.url.trim_end_matches('/'));
    let uri: hyper::Uri = url
        .parse()
        .map_err(|e: hyper::http::uri::InvalidUri| McpoError::UriParse {
            source: Box::new(e),
        })?;

    let connector = hyper_util::client::legacy::connect::HttpConnector::new();
    let client = Client::builder(TokioExecutor::new()).build(connector);

    let req = hyper::Request::builder()
        .uri(uri)
        .header(USER_HEADER, "mcpo-guard-cli")
        .body(http_body_util::Full::new(bytes::Bytes::new()))
        .map_err(|e| McpoError::HttpRequest {
            source: Box::new(e),
        })?;

    let response = tokio::time::timeout(HEALTH_TIMEOUT, client.request(req))
        .await
        .map_err(|_| McpoError::HttpRequest {
            source: "health check timed out after 10s".into(),
        })?
        .map_err(|e| McpoError::HttpRequest {
            source: Box::new(e),
        })?;

    let status = response.status();
    let echoed_id = response
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let body = response
        .into_body()
        .collect()
        .await
        .map_err(|e| McpoError::HttpRequest {
            source: Box::new(e),
        })?
        .to_bytes();

    if !status.is_success() {
        return Err(McpoError::HealthCheckFailed(status));
    }

    if args.json {
        println!("{}", String::from_utf8_lossy(&body));
        return Ok(());
    }

    match serde_json::from_slice::<HealthResponse>(&body) {
        Ok(health) => {
            println!("\u{2713} mcpo-guard is healthy ({})", args.url);
            println!("  version:        {}", health.version);
            println!("  uptime:         {}", format_uptime(health.uptime_seconds));
            println!("  request id:     {}", health.request_id);
            if echoed_id.as_deref() != Some(health.request_id.as_str()) {
                println!("  warning:        X-Request-ID header missing or mismatched");
            }
        }
        Err(e) => {
            eprintln!("Failed to parse health response: {e}");
            println!("{}", String::from_utf8_lossy(&body));
        }
    }

    Ok(())
}

fn format_uptime(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m {secs}s")
    } else if minutes > 0 {
        format!("{minutes}m {secs}s")
    } else {
        format!("{secs}s")
    }
}

#[cfg(test)]
mod tests {
    use super::format_uptime;

    #[test]
    fn formats_uptime_units() {
        assert_eq!(format_uptime(42), "42s");
        assert_eq!(format_uptime(125), "2m 5s");
        assert_eq!(format_uptime(3_725), "1h 2m 5s");
    }
}
