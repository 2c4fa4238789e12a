//! State behind the view. Owned and mutated by the event loop only.

use crate::{lookup::FetchOutcome, weather::WeatherSnapshot};
use log::{error, info};

/// Where we are in the fetch cycle
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum FetchStatus {
    #[default]
    Idle,
    /// A lookup is running. New triggers are ignored until it finishes
    InFlight,
    Done,
    /// Last lookup failed. Holds a short user-facing message; the details
    /// go to the log
    Failed(String),
}

#[derive(Debug, Default)]
pub struct ViewState {
    /// Input text, exactly as typed
    city: String,
    /// Last successful fetch. Only ever replaced wholesale
    weather: Option<WeatherSnapshot>,
    status: FetchStatus,
    /// Something changed since the last render
    dirty: bool,
}

impl ViewState {
    const MESSAGE_NOT_FOUND: &'static str = "위치를 찾을 수 없습니다.";
    const MESSAGE_FAILED: &'static str =
        "날씨 데이터를 가져오는 중 오류가 발생했습니다.";

    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn weather(&self) -> Option<&WeatherSnapshot> {
        self.weather.as_ref()
    }

    pub fn status(&self) -> &FetchStatus {
        &self.status
    }

    /// Input changed
    pub fn set_city(&mut self, city: impl Into<String>) {
        let city = city.into();
        if self.city != city {
            self.city = city;
            self.dirty = true;
        }
    }

    /// The user asked for weather. If a lookup should start, return the city
    /// to look up. The caller is expected to report back via [Self::complete].
    pub fn trigger(&mut self) -> Option<String> {
        if self.city.is_empty() {
            return None;
        }
        if self.status == FetchStatus::InFlight {
            info!(
                "Lookup already in progress, ignoring request for {}",
                self.city
            );
            return None;
        }
        self.status = FetchStatus::InFlight;
        self.dirty = true;
        Some(self.city.clone())
    }

    /// A lookup finished. Failures are logged and leave the previous weather
    /// in place.
    pub fn complete(&mut self, outcome: FetchOutcome) {
        self.status = match outcome {
            FetchOutcome::Weather(weather) => {
                info!("Received weather: {weather:?}");
                self.weather = Some(weather);
                FetchStatus::Done
            }
            FetchOutcome::NotFound { city } => {
                error!("Could not find location for {city}");
                FetchStatus::Failed(Self::MESSAGE_NOT_FOUND.into())
            }
            FetchOutcome::Failed(err) => {
                error!("{err:?}");
                FetchStatus::Failed(Self::MESSAGE_FAILED.into())
            }
        };
        self.dirty = true;
    }

    /// Check if the view needs to be redrawn, and reset the flag
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}
