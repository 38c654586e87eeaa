//! `get_weather` — 3-day forecast via Open-Meteo (no API key needed).

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use url::Url;

use super::{Tool, string_arg};
use crate::constants::{FORECAST_DAYS, TOOL_HTTP_TIMEOUT_SECS};

const GEOCODE_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";

/// Top geocoding match for a city name.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Place {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub admin1: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

impl Place {
    /// The matched name, or `city` when the geocoder returned none.
    pub fn display_name<'a>(&'a self, city: &'a str) -> &'a str {
        self.name.as_deref().filter(|name| !name.is_empty()).unwrap_or(city)
    }

    /// `name, admin1, country`, skipping missing parts.
    pub fn label(&self, city: &str) -> String {
        [Some(self.display_name(city)), self.admin1.as_deref(), self.country.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Option<Vec<Place>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Daily {
    #[serde(default)]
    pub time: Vec<String>,
    #[serde(default)]
    pub temperature_2m_min: Vec<Option<f64>>,
    #[serde(default)]
    pub temperature_2m_max: Vec<Option<f64>>,
}

#[derive(Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    daily: Daily,
}

pub struct WeatherTool {
    http: reqwest::Client,
    geocode_url: String,
    forecast_url: String,
}

impl WeatherTool {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(TOOL_HTTP_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self {
            http,
            geocode_url: GEOCODE_URL.to_string(),
            forecast_url: FORECAST_URL.to_string(),
        }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: Url) -> Result<T> {
        let response = self.http.get(url).send().await.context("send request")?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("HTTP {status}"));
        }
        response.json::<T>().await.context("decode response")
    }

    async fn geocode(&self, city: &str) -> Result<Option<Place>> {
        let url = Url::parse_with_params(
            &self.geocode_url,
            &[("name", city), ("count", "1"), ("language", "en"), ("format", "json")],
        )?;
        let body: GeocodeResponse = self.get_json(url).await?;
        Ok(body.results.and_then(|places| places.into_iter().next()))
    }

    async fn forecast(&self, place: &Place) -> Result<Daily> {
        let url = Url::parse_with_params(
            &self.forecast_url,
            &[
                ("latitude", place.latitude.to_string()),
                ("longitude", place.longitude.to_string()),
                ("daily", "temperature_2m_max,temperature_2m_min".to_string()),
                ("timezone", "auto".to_string()),
                ("temperature_unit", "fahrenheit".to_string()),
            ],
        )?;
        let body: ForecastResponse = self.get_json(url).await?;
        Ok(body.daily)
    }

    /// Look up the forecast for `city` and render it.
    pub async fn weather(&self, city: &str) -> String {
        let city = city.trim();
        if city.is_empty() {
            return "Please provide a city name. Example: /weather Austin, TX".to_string();
        }
        let place = match self.geocode(city).await {
            Ok(Some(place)) => place,
            Ok(None) => {
                return format!("Could not find coordinates for '{city}'. Try a more specific name.");
            }
            Err(err) => return format!("Geocoding failed for '{city}': {err:#}"),
        };
        match self.forecast(&place).await {
            Ok(daily) => format_forecast(&place, &daily, city),
            Err(err) => format!("Weather lookup failed for '{city}': {err:#}"),
        }
    }
}

impl Default for WeatherTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        "get_weather"
    }

    fn description(&self) -> &str {
        "Get a 3-day weather forecast (daily highs and lows in °F) for a city"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "city": {
                    "type": "string",
                    "description": "City name, optionally with region, e.g. 'Austin, TX'."
                }
            },
            "required": ["city"]
        })
    }

    async fn execute(&self, args: &Value) -> String {
        self.weather(string_arg(args, "city")).await
    }
}

/// Render up to [`FORECAST_DAYS`] days of lows and highs. `city` names the
/// place when the geocoder did not.
pub fn format_forecast(place: &Place, daily: &Daily, city: &str) -> String {
    if daily.time.is_empty() {
        return format!("No forecast available for {}.", place.display_name(city));
    }
    let mut lines = vec![format!(
        "{FORECAST_DAYS}-day forecast for {} ({:.2},{:.2}):",
        place.label(city),
        place.latitude,
        place.longitude
    )];
    for (i, day) in daily.time.iter().take(FORECAST_DAYS).enumerate() {
        let low = format_temp(daily.temperature_2m_min.get(i).copied().flatten());
        let high = format_temp(daily.temperature_2m_max.get(i).copied().flatten());
        lines.push(format!("{day}: {low}°F - {high}°F"));
    }
    lines.join("\n")
}

fn format_temp(value: Option<f64>) -> String {
    value.map_or_else(|| "?".to_string(), |t| format!("{t:.1}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn austin() -> Place {
        Place {
            name: Some("Austin".into()),
            admin1: Some("Texas".into()),
            country: Some("United States".into()),
            latitude: 30.26715,
            longitude: -97.74306,
        }
    }

    #[test]
    fn label_skips_missing_parts() {
        assert_eq!(austin().label("Austin, TX"), "Austin, Texas, United States");
        let bare = Place {
            admin1: None,
            country: Some(String::new()),
            ..austin()
        };
        assert_eq!(bare.label("Austin, TX"), "Austin");
    }

    #[test]
    fn formats_three_days() {
        let daily = Daily {
            time: vec![
                "2026-10-17".into(),
                "2026-10-18".into(),
                "2026-10-19".into(),
                "2026-10-20".into(),
            ],
            temperature_2m_min: vec![Some(61.0), Some(63.4), None, Some(60.0)],
            temperature_2m_max: vec![Some(84.2), Some(86.0), Some(80.5), Some(79.0)],
        };
        let out = format_forecast(&austin(), &daily, "Austin");
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines[0],
            "3-day forecast for Austin, Texas, United States (30.27,-97.74):"
        );
        assert_eq!(lines[1], "2026-10-17: 61.0°F - 84.2°F");
        assert_eq!(lines[3], "2026-10-19: ?°F - 80.5°F");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn empty_daily_reports_no_forecast() {
        assert_eq!(
            format_forecast(&austin(), &Daily::default(), "Austin"),
            "No forecast available for Austin."
        );
    }

    #[test]
    fn decodes_open_meteo_payloads() {
        let geo: GeocodeResponse = serde_json::from_str(
            r#"{"results":[{"name":"Paris","latitude":48.85,"longitude":2.35,"country":"France","admin1":"Île-de-France"}]}"#,
        )
        .unwrap();
        let place = geo.results.unwrap().remove(0);
        assert_eq!(place.label("Paris"), "Paris, Île-de-France, France");

        let empty: GeocodeResponse = serde_json::from_str(r#"{"generationtime_ms":0.5}"#).unwrap();
        assert!(empty.results.is_none());

        let forecast: ForecastResponse = serde_json::from_str(
            r#"{"daily":{"time":["2026-10-17"],"temperature_2m_max":[70.1],"temperature_2m_min":[null]}}"#,
        )
        .unwrap();
        assert_eq!(forecast.daily.temperature_2m_min, vec![None]);
    }

    #[test]
    fn nameless_match_falls_back_to_requested_city() {
        let geo: GeocodeResponse = serde_json::from_str(
            r#"{"results":[{"latitude":51.5,"longitude":-0.12,"country":"United Kingdom"}]}"#,
        )
        .unwrap();
        let place = geo.results.unwrap().remove(0);
        assert_eq!(place.name, None);
        assert_eq!(place.label("London"), "London, United Kingdom");

        let daily = Daily {
            time: vec!["2026-10-17".into()],
            temperature_2m_min: vec![Some(48.0)],
            temperature_2m_max: vec![Some(59.0)],
        };
        let out = format_forecast(&place, &daily, "London");
        assert!(out.starts_with("3-day forecast for London, United Kingdom (51.50,-0.12):"));
        assert_eq!(
            format_forecast(&place, &Daily::default(), "London"),
            "No forecast available for London."
        );
    }

    #[tokio::test]
    async fn blank_city_asks_for_one() {
        let out = WeatherTool::new().execute(&json!({"city": " "})).await;
        assert_eq!(out, "Please provide a city name. Example: /weather Austin, TX");
    }
}
