use crate::state::{FetchStatus, ViewState};

const TITLE: &str = "날씨 정보 앱";

/// Render the whole view as text. The weather block only appears once
/// there's been a successful fetch.
pub fn render(state: &ViewState) -> String {
    let mut lines = vec![
        TITLE.to_owned(),
        format!("도시 이름 입력: {}", state.city()),
    ];

    match state.status() {
        FetchStatus::Idle | FetchStatus::Done => {}
        FetchStatus::InFlight => lines.push("조회 중...".to_owned()),
        FetchStatus::Failed(message) => lines.push(format!("! {message}")),
    }

    if let Some(weather) = state.weather() {
        lines.push(String::new());
        // This is the *current* input, which may not be the city the weather
        // was fetched for
        lines.push(format!("{}의 날씨", state.city()));
        lines.push(format!("온도: {} °C", weather.temperature));
        lines.push(format!("습도: {} %", weather.humidity));
        lines.push(format!("풍속: {} m/s", weather.wind_speed));
    }

    lines.join("\n")
}
