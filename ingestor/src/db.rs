use crate::config::Config;
use crate::errors::{Error, Result};
use crate::line_protocol;
use crate::model::Point;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use tracing::{debug, info, warn};

/// Write side of the time-series store
#[async_trait]
pub trait TimeSeriesStore: Send + Sync {
    async fn write_points(&self, points: &[Point]) -> Result<()>;
}

/// InfluxDB 1.x HTTP API client bound to one database
#[derive(Debug, Clone)]
pub struct InfluxStore {
    client: Client,
    base_url: String,
    database: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
}

#[derive(Debug, Deserialize)]
struct StatementResult {
    #[serde(default)]
    series: Vec<Series>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Series {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

impl InfluxStore {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .build()
            .map_err(|e| Error::Startup(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.influx_url(),
            database: config.database.clone(),
            token: config.token.clone(),
        })
    }

    /// Builds the client, checks the store is reachable and selects the
    /// configured database. Any failure here is fatal for the process.
    pub async fn connect(config: &Config) -> Result<Self> {
        let store = Self::new(config)?;

        info!("Connecting to InfluxDB at {}...", store.base_url);
        store
            .ping()
            .await
            .map_err(|e| Error::Startup(format!("InfluxDB unreachable: {}", e)))?;
        info!("InfluxDB connection established");

        store
            .select_database(config.create_database)
            .await
            .map_err(|e| match e {
                Error::Startup(_) => e,
                other => Error::Startup(format!("database selection failed: {}", other)),
            })?;
        info!("Using database {}", store.database);

        Ok(store)
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    async fn ping(&self) -> Result<()> {
        let response = self.request(self.client.get(self.url("ping"))).send().await?;
        check_status(response).await.map(|_| ())
    }

    async fn select_database(&self, create_if_missing: bool) -> Result<()> {
        let databases = self.list_databases().await?;
        if databases.iter().any(|name| name == &self.database) {
            return Ok(());
        }

        if !create_if_missing {
            return Err(Error::Startup(format!(
                "database {} does not exist",
                self.database
            )));
        }

        warn!("Database {} does not exist, creating it", self.database);
        let statement = format!("CREATE DATABASE \"{}\"", self.database.replace('"', "\\\""));
        self.query(self.client.post(self.url("query")), &statement)
            .await
            .map(|_| ())
    }

    async fn list_databases(&self) -> Result<Vec<String>> {
        let response = self
            .query(self.client.get(self.url("query")), "SHOW DATABASES")
            .await?;

        Ok(response
            .results
            .into_iter()
            .flat_map(|r| r.series)
            .flat_map(|s| s.values)
            .filter_map(|row| row.into_iter().next())
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect())
    }

    async fn query(&self, builder: RequestBuilder, statement: &str) -> Result<QueryResponse> {
        let response = self
            .request(builder.query(&[("q", statement)]))
            .send()
            .await?;
        let response = check_status(response).await?;
        let parsed: QueryResponse = response.json().await?;

        if let Some(err) = parsed.results.iter().find_map(|r| r.error.as_ref()) {
            return Err(Error::Startup(format!("query {:?} failed: {}", statement, err)));
        }
        Ok(parsed)
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.header("Authorization", format!("Token {}", token)),
            None => builder,
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), endpoint)
    }
}

#[async_trait]
impl TimeSeriesStore for InfluxStore {
    async fn write_points(&self, points: &[Point]) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }

        let body = line_protocol::encode(points);
        debug!("Writing {} point(s) to {}", points.len(), self.database);

        let response = self
            .request(
                self.client
                    .post(self.url("write"))
                    .query(&[("db", self.database.as_str())])
                    .body(body),
            )
            .send()
            .await?;
        check_status(response).await.map(|_| ())
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(Error::StoreRejected {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MEASUREMENT;
    use std::time::Duration;
    use wiremock::{
        matchers::{body_string, header, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    fn config_for(server: &MockServer, extra: &[(&str, &str)]) -> Config {
        let addr = *server.address();
        let mut vars: Vec<(String, String)> = vec![
            ("INFLUXDB_HOST".to_string(), addr.ip().to_string()),
            ("INFLUXDB_PORT".to_string(), addr.port().to_string()),
        ];
        vars.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        Config::from_lookup(|key| {
            vars.iter()
                .rev()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        })
        .unwrap()
    }

    fn databases_body(names: &[&str]) -> serde_json::Value {
        let values: Vec<Vec<&str>> = names.iter().map(|n| vec![*n]).collect();
        serde_json::json!({
            "results": [{
                "statement_id": 0,
                "series": [{ "name": "databases", "columns": ["name"], "values": values }]
            }]
        })
    }

    async fn mount_ping(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(204))
            .mount(server)
            .await;
    }

    fn reading_point() -> Point {
        Point::new(MEASUREMENT)
            .tag("hive_id", "H1")
            .field("temperature", 34.2)
            .field("humidity", 55.0)
            .field("audio", 0.12)
            .field("bee_count", 142i64)
    }

    #[tokio::test]
    async fn test_connect_selects_existing_database() {
        let server = MockServer::start().await;
        mount_ping(&server).await;
        Mock::given(method("GET"))
            .and(path("/query"))
            .and(query_param("q", "SHOW DATABASES"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(databases_body(&["_internal", "beehive_data"])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let store = InfluxStore::connect(&config_for(&server, &[])).await.unwrap();

        assert_eq!(store.database(), "beehive_data");
    }

    #[tokio::test]
    async fn test_connect_fails_when_database_missing() {
        let server = MockServer::start().await;
        mount_ping(&server).await;
        Mock::given(method("GET"))
            .and(path("/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(databases_body(&["_internal"])))
            .mount(&server)
            .await;

        let result = InfluxStore::connect(&config_for(&server, &[])).await;

        match result {
            Err(Error::Startup(msg)) => assert!(msg.contains("beehive_data")),
            other => panic!("expected Startup error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connect_creates_missing_database_when_enabled() {
        let server = MockServer::start().await;
        mount_ping(&server).await;
        Mock::given(method("GET"))
            .and(path("/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(databases_body(&["_internal"])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .and(query_param("q", "CREATE DATABASE \"beehive_data\""))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "results": [{ "statement_id": 0 }] })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let config = config_for(&server, &[("INFLUXDB_CREATE_DATABASE", "true")]);

        assert!(InfluxStore::connect(&config).await.is_ok());
    }

    #[tokio::test]
    async fn test_connect_fails_when_ping_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = InfluxStore::connect(&config_for(&server, &[])).await;

        assert!(matches!(result, Err(Error::Startup(_))));
    }

    #[tokio::test]
    async fn test_write_points_posts_line_protocol() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/write"))
            .and(query_param("db", "beehive_data"))
            .and(body_string(
                "beehive_metrics,hive_id=H1 audio=0.12,bee_count=142i,humidity=55,temperature=34.2",
            ))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let store = InfluxStore::new(&config_for(&server, &[])).unwrap();

        store.write_points(&[reading_point()]).await.unwrap();
    }

    #[tokio::test]
    async fn test_write_sends_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/write"))
            .and(header("Authorization", "Token s3cret"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let store = InfluxStore::new(&config_for(&server, &[("INFLUXDB_TOKEN", "s3cret")])).unwrap();

        store.write_points(&[reading_point()]).await.unwrap();
    }

    #[tokio::test]
    async fn test_write_rejected_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/write"))
            .respond_with(
                ResponseTemplate::new(400).set_body_string(r#"{"error":"field type conflict"}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let store = InfluxStore::new(&config_for(&server, &[])).unwrap();
        let result = store.write_points(&[reading_point()]).await;

        match result {
            Err(Error::StoreRejected { status, body }) => {
                assert_eq!(status, 400);
                assert!(body.contains("field type conflict"));
            }
            other => panic!("expected StoreRejected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_write_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/write"))
            .respond_with(ResponseTemplate::new(204).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let store =
            InfluxStore::new(&config_for(&server, &[("INFLUXDB_TIMEOUT_MS", "100")])).unwrap();
        let result = store.write_points(&[reading_point()]).await;

        assert!(matches!(result, Err(Error::StoreTimeout)));
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        let store = InfluxStore::new(&config_for(&server, &[])).unwrap();

        store.write_points(&[]).await.unwrap();
    }
}
