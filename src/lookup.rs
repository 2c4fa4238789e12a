use crate::{
    city::CityResolver,
    config::Config,
    http::Transport,
    weather::{WeatherFetcher, WeatherSnapshot},
};
use anyhow::Context;
use std::sync::Arc;

/// Result of one full lookup: city to coordinate to weather
#[derive(Debug)]
pub enum FetchOutcome {
    Weather(WeatherSnapshot),
    /// Not in the table, and the geocoder didn't know it either
    NotFound { city: String },
    Failed(anyhow::Error),
}

/// The whole fetch sequence triggered by the user. Runs off the UI thread.
pub struct Lookup {
    resolver: CityResolver,
    fetcher: WeatherFetcher,
}

impl Lookup {
    pub fn new(config: &Config, transport: Arc<dyn Transport>) -> Self {
        Self {
            resolver: CityResolver::new(config, Arc::clone(&transport)),
            fetcher: WeatherFetcher::new(config, transport),
        }
    }

    /// Resolve the city, then fetch its weather. Never fails; failures are
    /// folded into the outcome.
    pub fn run(&self, city: &str) -> FetchOutcome {
        let coordinate = match self
            .resolver
            .resolve(city)
            .with_context(|| format!("Error resolving location of {city}"))
        {
            Ok(Some(coordinate)) => coordinate,
            Ok(None) => return FetchOutcome::NotFound { city: city.into() },
            Err(err) => return FetchOutcome::Failed(err),
        };
        match self
            .fetcher
            .fetch(coordinate)
            .with_context(|| format!("Error fetching weather for {city}"))
        {
            Ok(weather) => FetchOutcome::Weather(weather),
            Err(err) => FetchOutcome::Failed(err),
        }
    }
}
