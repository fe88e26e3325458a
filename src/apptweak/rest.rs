use super::types::*;
use super::StoreApi;
use crate::config::ApptweakConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;

const API_KEY_HEADER: &str = "x-apptweak-key";

pub struct AppTweakRest {
    client: Client,
    charts_url: String,
    metadata_url: String,
}

impl AppTweakRest {
    pub fn new(api_key: &str, config: &ApptweakConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let mut key = HeaderValue::from_str(api_key)
            .context("AppTweak API key contains characters not allowed in a header")?;
        key.set_sensitive(true);
        headers.insert(API_KEY_HEADER, key);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            charts_url: config.charts_url.clone(),
            metadata_url: config.metadata_url.clone(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let resp = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("GET {} failed ({}): {}", url, status, body);
        }

        resp.json().await.context("failed to parse AppTweak response")
    }
}

#[async_trait]
impl StoreApi for AppTweakRest {
    async fn top_free_ids(&self, query: &ChartQuery) -> Result<Vec<AppId>> {
        let params = [
            ("categories", query.category.clone()),
            ("types", "free".to_string()),
            ("country", query.country.clone()),
            ("device", query.device.clone()),
            ("limit", query.limit.to_string()),
            ("offset", query.offset.to_string()),
        ];
        let resp: ChartsResponse = self.get_json(&self.charts_url, &params).await?;
        Ok(resp.into_free_ids())
    }

    async fn metadata(
        &self,
        ids: &[AppId],
        country: &str,
        device: &str,
    ) -> Result<HashMap<String, AppMetadata>> {
        let apps = ids.iter().map(AppId::as_str).collect::<Vec<_>>().join(",");
        let params = [
            ("apps", apps),
            ("country", country.to_string()),
            ("device", device.to_string()),
        ];
        let resp: MetadataResponse = self.get_json(&self.metadata_url, &params).await?;
        Ok(resp.into_records())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve exactly one canned HTTP response and hand back the raw request head.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&buf).to_string()
        });
        (format!("http://{}", addr), handle)
    }

    fn test_config(base: &str) -> ApptweakConfig {
        ApptweakConfig {
            charts_url: format!("{}/charts.json", base),
            metadata_url: format!("{}/metadata.json", base),
            ..ApptweakConfig::default()
        }
    }

    #[tokio::test]
    async fn test_chart_request_shape() {
        let (base, server) = serve_once("200 OK", r#"{"result":{"k":{"free":{"value":[11,22]}}}}"#).await;
        let api = AppTweakRest::new("secret-key", &test_config(&base)).unwrap();

        let query = ChartQuery {
            category: "7012".to_string(),
            country: "us".to_string(),
            device: "iphone".to_string(),
            limit: 100,
            offset: 200,
        };
        let ids = api.top_free_ids(&query).await.unwrap();
        assert_eq!(ids, vec![AppId::from(11), AppId::from(22)]);

        let request = server.await.unwrap().to_lowercase();
        assert!(request.starts_with(
            "get /charts.json?categories=7012&types=free&country=us&device=iphone&limit=100&offset=200 "
        ));
        assert!(request.contains("x-apptweak-key: secret-key"));
        assert!(request.contains("accept: application/json"));
    }

    #[tokio::test]
    async fn test_metadata_request_joins_ids() {
        let (base, server) = serve_once(
            "200 OK",
            r#"{"result":{"1":{"metadata":{"title":"One","release_date":"2025-03-01T00:00:00Z"}}}}"#,
        )
        .await;
        let api = AppTweakRest::new("k", &test_config(&base)).unwrap();

        let ids = vec![AppId::from(1), AppId::from(2), AppId::from(3)];
        let records = api.metadata(&ids, "gb", "iphone").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records["1"].title.as_deref(), Some("One"));

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /metadata.json?apps=1%2C2%2C3&country=gb&device=iphone "));
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let (base, server) = serve_once("429 Too Many Requests", r#"{"error":"rate limited"}"#).await;
        let api = AppTweakRest::new("k", &test_config(&base)).unwrap();

        let query = ChartQuery {
            category: "7001".to_string(),
            country: "us".to_string(),
            device: "iphone".to_string(),
            limit: 100,
            offset: 0,
        };
        let err = api.top_free_ids(&query).await.unwrap_err();
        assert!(format!("{:#}", err).contains("429"));
        server.await.unwrap();
    }

    #[test]
    fn test_rejects_key_with_newline() {
        assert!(AppTweakRest::new("bad\nkey", &ApptweakConfig::default()).is_err());
    }

    /// Integration test: hits the real AppTweak API.
    /// Run with: APPTWEAK_API_KEY=... cargo test apptweak_live -- --ignored --nocapture
    #[tokio::test]
    #[ignore]
    async fn apptweak_live_fetch() {
        let key = std::env::var("APPTWEAK_API_KEY").unwrap_or_default();
        let api = AppTweakRest::new(&key, &ApptweakConfig::default()).unwrap();
        let query = ChartQuery {
            category: "7012".to_string(),
            country: "us".to_string(),
            device: "iphone".to_string(),
            limit: 10,
            offset: 0,
        };
        match api.top_free_ids(&query).await {
            Ok(ids) => {
                println!("Got {} ranked puzzle games", ids.len());
                let records = api.metadata(&ids[..ids.len().min(5)], "us", "iphone").await;
                println!("{:#?}", records);
            }
            Err(e) => println!("AppTweak fetch error: {:#}", e),
        }
    }
}
