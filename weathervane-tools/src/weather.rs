use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use weathervane_agent::{ToolContext, ToolError, TypedTool};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Celsius,
    Fahrenheit,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct WeatherQuery {
    /// The city to get weather for
    pub city: String,
    #[serde(default)]
    pub units: Units,
}

impl WeatherQuery {
    pub fn new(city: impl Into<String>) -> Self {
        Self {
            city: city.into(),
            units: Units::default(),
        }
    }

    pub fn with_units(mut self, units: Units) -> Self {
        self.units = units;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherReport {
    pub city: String,
    pub temperature_range: String,
    pub conditions: String,
    pub humidity: u8,
    pub wind_speed: String,
}

struct CityRecord {
    key: &'static str,
    city: &'static str,
    celsius: &'static str,
    fahrenheit: &'static str,
    conditions: &'static str,
    humidity: u8,
    wind_speed: &'static str,
}

impl CityRecord {
    fn report(&self, city: &str, units: Units) -> WeatherReport {
        let temperature_range = match units {
            Units::Celsius => self.celsius,
            Units::Fahrenheit => self.fahrenheit,
        };
        WeatherReport {
            city: city.to_string(),
            temperature_range: temperature_range.to_string(),
            conditions: self.conditions.to_string(),
            humidity: self.humidity,
            wind_speed: self.wind_speed.to_string(),
        }
    }
}

const KNOWN_CITIES: &[CityRecord] = &[
    CityRecord {
        key: "tokyo",
        city: "Tokyo",
        celsius: "14-20°C",
        fahrenheit: "57-68°F",
        conditions: "Partly cloudy with light winds",
        humidity: 65,
        wind_speed: "12 km/h",
    },
    CityRecord {
        key: "london",
        city: "London",
        celsius: "8-12°C",
        fahrenheit: "46-54°F",
        conditions: "Overcast with chance of rain",
        humidity: 78,
        wind_speed: "15 km/h",
    },
    CityRecord {
        key: "new york",
        city: "New York",
        celsius: "10-17°C",
        fahrenheit: "50-62°F",
        conditions: "Clear and sunny",
        humidity: 55,
        wind_speed: "8 km/h",
    },
];

// Reported for any city not in the table; the caller's spelling is echoed.
const FALLBACK: CityRecord = CityRecord {
    key: "",
    city: "",
    celsius: "20-24°C",
    fahrenheit: "68-75°F",
    conditions: "Pleasant and mild",
    humidity: 60,
    wind_speed: "10 km/h",
};

/// Mock weather lookup. Known cities match case-insensitively and report
/// their canonical name; anything else gets the generic fallback report.
pub fn lookup_weather(query: &WeatherQuery) -> WeatherReport {
    let key = query.city.to_lowercase();
    match KNOWN_CITIES.iter().find(|record| record.key == key) {
        Some(record) => record.report(record.city, query.units),
        None => FALLBACK.report(&query.city, query.units),
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct GetWeather;

impl TypedTool for GetWeather {
    type Args = WeatherQuery;
    type Output = WeatherReport;

    const NAME: &'static str = "get_weather";
    const DESCRIPTION: &'static str = "Get comprehensive weather information for a city.";

    async fn run(&self, args: WeatherQuery, ctx: ToolContext) -> Result<WeatherReport, ToolError> {
        tracing::info!(
            city = %args.city,
            units = ?args.units,
            call_id = %ctx.call_id,
            "fetching weather"
        );
        let report = lookup_weather(&args);
        tracing::debug!(city = %report.city, "weather data retrieved");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_city_keys_are_lowercase_and_unique() {
        let mut keys: Vec<_> = KNOWN_CITIES.iter().map(|record| record.key).collect();
        assert!(keys.iter().all(|key| *key == key.to_lowercase()));
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), KNOWN_CITIES.len());
    }

    #[test]
    fn units_default_to_celsius() {
        let query: WeatherQuery = serde_json::from_str(r#"{"city":"Oslo"}"#).unwrap();
        assert_eq!(query.units, Units::Celsius);
    }
}
