//! Open-Meteo adapter (geocoding + current weather for `!weather`).
//!
//! Both APIs are keyless. Each call is bounded by the configured lookup timeout.

use std::{future::Future, time::Duration};

use async_trait::async_trait;
use serde_json::Value;

use relay_core::{
    config::Config,
    domain::Coordinates,
    errors::Error,
    ports::{CurrentWeather, WeatherLookup},
    utils::truncate_text,
    Result,
};

#[derive(Clone, Debug)]
pub struct OpenMeteoClient {
    geocoding_url: String,
    weather_url: String,
    timeout: Duration,
    http: reqwest::Client,
}

impl OpenMeteoClient {
    pub fn new(
        geocoding_url: impl Into<String>,
        weather_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("http client build failed: {e}")))?;
        Ok(Self {
            geocoding_url: geocoding_url.into(),
            weather_url: weather_url.into(),
            timeout,
            http,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::new(&cfg.geocoding_url, &cfg.weather_url, cfg.lookup_timeout)
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value> {
        let resp = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| self.request_error("request", e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::External(format!(
                "open-meteo request failed: {status} {}",
                truncate_text(&body, 200)
            )));
        }

        resp.json().await.map_err(|e| self.request_error("json", e))
    }

    // reqwest's own deadline usually fires before `bounded`; both mean Timeout.
    fn request_error(&self, stage: &str, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::Timeout(self.timeout)
        } else {
            Error::External(format!("open-meteo {stage} error: {e}"))
        }
    }

    async fn bounded<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| Error::Timeout(self.timeout))?
    }
}

#[async_trait]
impl WeatherLookup for OpenMeteoClient {
    async fn geocode(&self, place: &str) -> Result<Option<Coordinates>> {
        let query = [
            ("name", place.to_string()),
            ("count", "1".to_string()),
            ("format", "json".to_string()),
        ];
        let v = self
            .bounded(self.get_json(&self.geocoding_url, &query))
            .await?;
        let found = parse_geocoding(&v)?;
        tracing::debug!(place, found = found.is_some(), "geocoded");
        Ok(found)
    }

    async fn current_weather(&self, at: Coordinates) -> Result<CurrentWeather> {
        let query = [
            ("latitude", at.latitude.to_string()),
            ("longitude", at.longitude.to_string()),
            ("current_weather", "true".to_string()),
        ];
        let v = self.bounded(self.get_json(&self.weather_url, &query)).await?;
        parse_current_weather(&v)
    }
}

/// First geocoding hit. A payload without `results` means "not found".
pub fn parse_geocoding(v: &Value) -> Result<Option<Coordinates>> {
    let Some(first) = v
        .get("results")
        .and_then(Value::as_array)
        .and_then(|r| r.first())
    else {
        return Ok(None);
    };

    let latitude = first.get("latitude").and_then(Value::as_f64);
    let longitude = first.get("longitude").and_then(Value::as_f64);
    match (latitude, longitude) {
        (Some(latitude), Some(longitude)) => Ok(Some(Coordinates {
            latitude,
            longitude,
        })),
        _ => Err(Error::External(
            "open-meteo geocoding result lacks coordinates".to_string(),
        )),
    }
}

pub fn parse_current_weather(v: &Value) -> Result<CurrentWeather> {
    let current = v
        .get("current_weather")
        .filter(|c| c.as_object().is_some_and(|o| !o.is_empty()))
        .ok_or_else(|| Error::External("no weather info received".to_string()))?;

    let field = |name: &str| {
        current.get(name).and_then(Value::as_f64).ok_or_else(|| {
            Error::External(format!("open-meteo current_weather lacks `{name}`"))
        })
    };

    Ok(CurrentWeather {
        temperature: field("temperature")?,
        windspeed: field("windspeed")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn geocoding_takes_first_result() {
        let v = json!({
            "results": [
                {"name": "Berlin", "latitude": 52.52437, "longitude": 13.41053},
                {"name": "Berlin", "latitude": 39.9, "longitude": -74.9},
            ],
            "generationtime_ms": 0.5
        });
        assert_eq!(
            parse_geocoding(&v).unwrap(),
            Some(Coordinates {
                latitude: 52.52437,
                longitude: 13.41053
            })
        );
    }

    #[test]
    fn geocoding_without_results_is_not_found() {
        assert_eq!(parse_geocoding(&json!({"generationtime_ms": 0.2})).unwrap(), None);
        assert_eq!(parse_geocoding(&json!({"results": []})).unwrap(), None);
    }

    #[test]
    fn geocoding_result_without_coordinates_is_an_error() {
        let err = parse_geocoding(&json!({"results": [{"name": "x"}]})).unwrap_err();
        assert!(err.is_external());
    }

    #[test]
    fn current_weather_reads_temperature_and_windspeed() {
        let v = json!({
            "latitude": 52.52,
            "longitude": 13.42,
            "current_weather": {
                "temperature": 14.2,
                "windspeed": 9.7,
                "winddirection": 250,
                "weathercode": 3
            }
        });
        assert_eq!(
            parse_current_weather(&v).unwrap(),
            CurrentWeather {
                temperature: 14.2,
                windspeed: 9.7
            }
        );
    }

    #[test]
    fn missing_current_weather_is_an_error() {
        assert!(parse_current_weather(&json!({})).is_err());
        assert!(parse_current_weather(&json!({"current_weather": {}})).is_err());
        let err = parse_current_weather(&json!({"current_weather": {"temperature": 1.0}}))
            .unwrap_err();
        assert!(err.to_string().contains("windspeed"));
    }

    #[tokio::test]
    async fn silent_server_surfaces_as_timeout_within_bound() {
        // Accepts connections and never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((sock, _)) = listener.accept().await {
                held.push(sock);
            }
        });

        let timeout = Duration::from_millis(300);
        let client = OpenMeteoClient::new(
            format!("http://{addr}/v1/search"),
            format!("http://{addr}/v1/forecast"),
            timeout,
        )
        .unwrap();

        let started = std::time::Instant::now();
        let err = client
            .current_weather(Coordinates {
                latitude: 1.0,
                longitude: 2.0,
            })
            .await
            .unwrap_err();
        let elapsed = started.elapsed();

        assert!(matches!(err, Error::Timeout(t) if t == timeout), "got {err:?}");
        assert!(elapsed >= Duration::from_millis(250), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(3), "elapsed {elapsed:?}");
    }

    #[tokio::test]
    async fn unreachable_host_surfaces_as_external_error() {
        // Port 9 on loopback: nothing listens, the connect is refused immediately.
        let client = OpenMeteoClient::new(
            "http://127.0.0.1:9/v1/search",
            "http://127.0.0.1:9/v1/forecast",
            Duration::from_secs(2),
        )
        .unwrap();
        let err = client.geocode("Berlin").await.unwrap_err();
        assert!(err.is_external(), "got {err:?}");
    }
}
