use crate::{
    city::Coordinate,
    config::Config,
    http::{redact, Transport},
};
use anyhow::{anyhow, bail, Context};
use chrono::{Local, NaiveDateTime, NaiveTime};
use log::{info, warn};
use serde::{Deserialize, Deserializer};
use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
    sync::Arc,
};

/// Shown in place of any measurement the service didn't report
pub const NO_DATA: &str = "데이터 없음";

/// The three measurements we care about from a single observation
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WeatherSnapshot {
    /// °C
    pub temperature: String,
    /// %
    pub humidity: String,
    /// m/s
    pub wind_speed: String,
}

impl WeatherSnapshot {
    /// Pick measurements out of a list of observation items. The first item
    /// of each category wins.
    fn from_items(items: &[ObservationItem]) -> Self {
        let find = |category: Category| {
            items
                .iter()
                .find(|item| item.category == category.code())
                .map(|item| item.obsr_value.clone())
                .unwrap_or_else(|| NO_DATA.to_owned())
        };
        Self {
            temperature: find(Category::Temperature),
            humidity: find(Category::Humidity),
            wind_speed: find(Category::WindSpeed),
        }
    }
}

/// Observation categories, as coded by the weather service
#[derive(Copy, Clone, Debug)]
enum Category {
    Temperature,
    Humidity,
    WindSpeed,
}

impl Category {
    fn code(self) -> &'static str {
        match self {
            Self::Temperature => "T1H",
            Self::Humidity => "REH",
            Self::WindSpeed => "WSD",
        }
    }
}

/// Which hourly observation to ask for. Serializes as `HHMM` or `latest`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(try_from = "String")]
pub enum BaseTime {
    /// Always ask for this time of day, on today's date
    Fixed(NaiveTime),
    /// The most recent observation that should already be published
    Latest,
}

impl BaseTime {
    /// Observations are published roughly this long after the hour
    const PUBLISH_DELAY_MINUTES: i64 = 40;
    const DEFAULT_TIME: NaiveTime = match NaiveTime::from_hms_opt(6, 0, 0) {
        Some(time) => time,
        None => panic!("Invalid default base time"),
    };

    /// Get `(base_date, base_time)` request parameters, formatted as
    /// `YYYYMMDD` and `HHMM`
    pub fn resolve(self, now: NaiveDateTime) -> (String, String) {
        match self {
            Self::Fixed(time) => (
                now.format("%Y%m%d").to_string(),
                time.format("%H%M").to_string(),
            ),
            Self::Latest => {
                // Can roll back to yesterday shortly after midnight
                let delay =
                    chrono::Duration::minutes(Self::PUBLISH_DELAY_MINUTES);
                let published = now - delay;
                (
                    published.format("%Y%m%d").to_string(),
                    published.format("%H00").to_string(),
                )
            }
        }
    }
}

impl Default for BaseTime {
    fn default() -> Self {
        Self::Fixed(Self::DEFAULT_TIME)
    }
}

impl FromStr for BaseTime {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("latest") {
            return Ok(Self::Latest);
        }
        // Observations are hourly, so only HH00 is meaningful
        let hour = match s.as_bytes() {
            [h1, h2, b'0', b'0']
                if h1.is_ascii_digit() && h2.is_ascii_digit() =>
            {
                u32::from(h1 - b'0') * 10 + u32::from(h2 - b'0')
            }
            _ => bail!("Invalid base time `{s}`, expected HH00 or `latest`"),
        };
        NaiveTime::from_hms_opt(hour, 0, 0).map(Self::Fixed).ok_or_else(|| {
            anyhow!("Invalid base time `{s}`, hour out of range")
        })
    }
}

impl Display for BaseTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(time) => write!(f, "{}", time.format("%H%M")),
            Self::Latest => write!(f, "latest"),
        }
    }
}

// Needed for serde
impl TryFrom<String> for BaseTime {
    type Error = <BaseTime as FromStr>::Err;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Fetches current observations from the short-term forecast service
pub struct WeatherFetcher {
    transport: Arc<dyn Transport>,
    url: String,
    service_key: Option<String>,
    base_time: BaseTime,
}

impl WeatherFetcher {
    pub fn new(config: &Config, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            url: config.weather_url.clone(),
            service_key: config.weather_api_key.clone(),
            base_time: config.base_time,
        }
    }

    /// Fetch the current observation for a location
    pub fn fetch(
        &self,
        coordinate: Coordinate,
    ) -> anyhow::Result<WeatherSnapshot> {
        self.fetch_at(coordinate, Local::now().naive_local())
    }

    fn fetch_at(
        &self,
        coordinate: Coordinate,
        now: NaiveDateTime,
    ) -> anyhow::Result<WeatherSnapshot> {
        let service_key = self
            .service_key
            .as_deref()
            .ok_or_else(|| anyhow!("No weather service key is set"))?;
        if !coordinate.is_grid() {
            warn!(
                "Requesting weather for {coordinate}, which is not a forecast \
                grid cell. The result is probably for the wrong place"
            );
        }

        let (nx, ny) = coordinate.grid_pair();
        let (base_date, base_time) = self.base_time.resolve(now);
        let url = format!(
            "{}?ServiceKey={}&pageNo=1&numOfRows=1000&dataType=JSON\
            &base_date={base_date}&base_time={base_time}&nx={nx}&ny={ny}",
            self.url,
            urlencoding::encode(service_key),
        );

        info!("Fetching weather for {coordinate} at {base_date} {base_time}");
        let body = self.transport.get(&url)?;
        let response: ObservationResponse = serde_json::from_str(&body)
            .with_context(|| {
                format!("Error parsing weather response from {}", redact(&url))
            })?;
        Ok(WeatherSnapshot::from_items(response.items()?))
    }
}

/// https://www.data.go.kr/data/15084084/openapi.do
#[derive(Debug, Deserialize)]
struct ObservationResponse {
    response: ObservationEnvelope,
}

#[derive(Debug, Deserialize)]
struct ObservationEnvelope {
    header: Option<ObservationHeader>,
    body: Option<ObservationBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObservationHeader {
    result_code: String,
    result_msg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObservationBody {
    items: ObservationItems,
}

#[derive(Debug, Deserialize)]
struct ObservationItems {
    #[serde(default)]
    item: Vec<ObservationItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObservationItem {
    category: String,
    #[serde(deserialize_with = "string_or_number")]
    obsr_value: String,
}

impl ObservationResponse {
    /// Get the observation items, or the service's own error
    fn items(&self) -> anyhow::Result<&[ObservationItem]> {
        if let Some(header) = &self.response.header {
            if header.result_code != "00" {
                bail!(
                    "Weather service returned {}: {}",
                    header.result_code,
                    header.result_msg.as_deref().unwrap_or("no message")
                );
            }
        }
        let body = self
            .response
            .body
            .as_ref()
            .ok_or_else(|| anyhow!("Weather response has no body"))?;
        Ok(&body.items.item)
    }
}

/// Observation values are documented as strings, but accept numbers too
fn string_or_number<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Value {
        String(String),
        Number(serde_json::Number),
    }

    Ok(match Value::deserialize(deserializer)? {
        Value::String(value) => value,
        Value::Number(value) => value.to_string(),
    })
}
