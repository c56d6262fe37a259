//! Tools exposed to the weather assistant.

pub mod weather;

pub use weather::{lookup_weather, GetWeather, Units, WeatherQuery, WeatherReport};
