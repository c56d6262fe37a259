use serde_json::json;
use weathervane_agent::{CancellationToken, ToolCallEnvelope, ToolContext, ToolSet};
use weathervane_tools::{lookup_weather, GetWeather, Units, WeatherQuery, WeatherReport};

fn report(city: &str, range: &str, conditions: &str, humidity: u8, wind: &str) -> WeatherReport {
    WeatherReport {
        city: city.to_string(),
        temperature_range: range.to_string(),
        conditions: conditions.to_string(),
        humidity,
        wind_speed: wind.to_string(),
    }
}

#[test]
fn known_cities_return_their_fixed_record_per_unit() {
    let cases = [
        ("Tokyo", Units::Celsius, report("Tokyo", "14-20°C", "Partly cloudy with light winds", 65, "12 km/h")),
        ("Tokyo", Units::Fahrenheit, report("Tokyo", "57-68°F", "Partly cloudy with light winds", 65, "12 km/h")),
        ("London", Units::Celsius, report("London", "8-12°C", "Overcast with chance of rain", 78, "15 km/h")),
        ("London", Units::Fahrenheit, report("London", "46-54°F", "Overcast with chance of rain", 78, "15 km/h")),
        ("New York", Units::Celsius, report("New York", "10-17°C", "Clear and sunny", 55, "8 km/h")),
        ("New York", Units::Fahrenheit, report("New York", "50-62°F", "Clear and sunny", 55, "8 km/h")),
    ];

    for (city, units, expected) in cases {
        let query = WeatherQuery::new(city).with_units(units);
        assert_eq!(lookup_weather(&query), expected, "{city} {units:?}");
    }
}

#[test]
fn city_match_is_case_insensitive_and_reports_canonical_name() {
    let report = lookup_weather(&WeatherQuery::new("nEw YoRk"));
    assert_eq!(report.city, "New York");
    assert_eq!(report.temperature_range, "10-17°C");
}

#[test]
fn unknown_city_gets_fallback_with_city_echoed() {
    let celsius = lookup_weather(&WeatherQuery::new("reykjavík"));
    let fahrenheit = lookup_weather(&WeatherQuery::new("reykjavík").with_units(Units::Fahrenheit));

    assert_eq!(
        celsius,
        report("reykjavík", "20-24°C", "Pleasant and mild", 60, "10 km/h")
    );
    assert_eq!(fahrenheit.city, "reykjavík");
    assert_eq!(fahrenheit.temperature_range, "68-75°F");
}

#[test]
fn unit_ranges_are_distinct_fixed_strings() {
    for city in ["Tokyo", "London", "New York", "Nowhere"] {
        let c = lookup_weather(&WeatherQuery::new(city).with_units(Units::Celsius));
        let f = lookup_weather(&WeatherQuery::new(city).with_units(Units::Fahrenheit));
        assert_ne!(c.temperature_range, f.temperature_range);
        assert!(c.temperature_range.ends_with("°C"));
        assert!(f.temperature_range.ends_with("°F"));
        assert_eq!(c.conditions, f.conditions);
        assert_eq!(c.humidity, f.humidity);
    }
}

#[test]
fn repeated_lookups_are_byte_identical() {
    let query = WeatherQuery::new("London").with_units(Units::Fahrenheit);
    let first = serde_json::to_vec(&lookup_weather(&query)).unwrap();
    let second = serde_json::to_vec(&lookup_weather(&query)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn report_serializes_in_camel_case() {
    let value = serde_json::to_value(lookup_weather(&WeatherQuery::new("Tokyo"))).unwrap();
    assert_eq!(
        value,
        json!({
            "city": "Tokyo",
            "temperatureRange": "14-20°C",
            "conditions": "Partly cloudy with light winds",
            "humidity": 65,
            "windSpeed": "12 km/h"
        })
    );
}

#[tokio::test]
async fn get_weather_tool_dispatches_with_default_units() {
    let tools = ToolSet::new().register_with(GetWeather).build().unwrap();
    let spec = &tools.specs()[0];
    assert_eq!(spec.name, "get_weather");
    assert_eq!(spec.parameters["required"], json!(["city"]));
    let units_schema = spec.parameters["properties"]["units"].to_string();
    assert!(units_schema.contains("celsius") && units_schema.contains("fahrenheit"));

    let output = tools
        .dispatch(
            ToolCallEnvelope {
                name: "get_weather".to_string(),
                args: json!({"city": "Tokyo"}),
                call_id: "call_1".to_string(),
            },
            ToolContext {
                call_id: "call_1".to_string(),
                turn: 1,
                cancellation: CancellationToken::new(),
            },
        )
        .await
        .unwrap();

    assert_eq!(output["temperatureRange"], "14-20°C");
    assert_eq!(output["city"], "Tokyo");
}
