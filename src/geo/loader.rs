//! Fetch a boundary layer over HTTP or read it from disk

use super::FeatureCollection;
use crate::error::{DashboardError, Result};
use log::{debug, info};
use std::path::Path;
use std::time::Duration;

/// Load a GeoJSON FeatureCollection
///
/// `http://` and `https://` sources are fetched with a blocking GET; a
/// non-2xx status is an error. Anything else is a local path, with an
/// optional `file://` prefix.
pub fn load_layer(source: &str, timeout: Duration) -> Result<FeatureCollection> {
    let layer = if source.starts_with("http://") || source.starts_with("https://") {
        fetch_layer(source, timeout)?
    } else {
        let path = source.strip_prefix("file://").unwrap_or(source);
        read_layer(Path::new(path))?
    };
    info!("Loaded {} features from {}", layer.len(), source);
    Ok(layer)
}

fn fetch_layer(url: &str, timeout: Duration) -> Result<FeatureCollection> {
    let http_err = |source: reqwest::Error| DashboardError::Http {
        url: url.to_string(),
        source,
    };

    debug!("Fetching {} (timeout {:?})", url, timeout);
    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(http_err)?;
    let body = client
        .get(url)
        .send()
        .and_then(|resp| resp.error_for_status())
        .and_then(|resp| resp.text())
        .map_err(http_err)?;

    Ok(serde_json::from_str(&body)?)
}

fn read_layer(path: &Path) -> Result<FeatureCollection> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Answer a single GET on a local port with the given status and body
    fn serve_once(status: &'static str, body: &'static str) -> (String, thread::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind");
        let url = format!("http://{}/regiones.geojson", listener.local_addr().expect("addr"));
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().expect("Failed to accept");
            let mut reader = BufReader::new(stream);
            let mut line = String::new();
            // Drain the request head
            while reader.read_line(&mut line).map(|n| n > 0).unwrap_or(false) {
                if line == "\r\n" {
                    break;
                }
                line.clear();
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let mut stream = reader.into_inner();
            stream.write_all(response.as_bytes()).expect("Failed to respond");
            stream.flush().expect("Failed to flush");
        });
        (url, handle)
    }

    const LAYER: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"region_id": 13},
             "geometry": {"type": "Polygon", "coordinates": [[[-70.8, -33.6], [-70.5, -33.6], [-70.5, -33.3], [-70.8, -33.6]]]}}
        ]
    }"#;

    #[test]
    fn test_read_local_path() {
        let mut file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(LAYER.as_bytes()).expect("Failed to write");

        let source = file.path().to_string_lossy().to_string();
        let layer = load_layer(&source, Duration::from_secs(1)).expect("Failed to load");
        assert_eq!(layer.len(), 1);

        let prefixed = format!("file://{}", source);
        assert_eq!(load_layer(&prefixed, Duration::from_secs(1)).expect("Failed to load").len(), 1);
    }

    #[test]
    fn test_fetch_over_http() {
        let (url, server) = serve_once("200 OK", LAYER);
        let layer = load_layer(&url, Duration::from_secs(5)).expect("Failed to fetch");
        server.join().expect("server thread");
        assert_eq!(layer.len(), 1);
        assert_eq!(layer.features[0].key("region_id").as_deref(), Some("13"));
    }

    #[test]
    fn test_http_error_status() {
        let (url, server) = serve_once("404 Not Found", "");
        let result = load_layer(&url, Duration::from_secs(5));
        server.join().expect("server thread");
        match result {
            Err(DashboardError::Http { url: failed, source }) => {
                assert_eq!(failed, url);
                assert_eq!(source.status(), Some(reqwest::StatusCode::NOT_FOUND));
            }
            other => panic!("expected an HTTP error, got {:?}", other.map(|l| l.len())),
        }
    }

    #[test]
    fn test_missing_file() {
        let result = load_layer("/nonexistent/regiones.geojson", Duration::from_secs(1));
        assert!(matches!(result, Err(DashboardError::Io(_))));
    }

    #[test]
    fn test_malformed_json() {
        let mut file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(b"{not json").expect("Failed to write");

        let result = load_layer(&file.path().to_string_lossy(), Duration::from_secs(1));
        assert!(matches!(result, Err(DashboardError::Json(_))));
    }
}
