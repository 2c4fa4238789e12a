use city_weather::{app, config::Config};
use log::LevelFilter;

fn main() -> anyhow::Result<()> {
    env_logger::builder()
        .filter_module("city_weather", LevelFilter::Info)
        .parse_default_env()
        .init();

    let config = Config::load()?;
    app::run(config)
}
