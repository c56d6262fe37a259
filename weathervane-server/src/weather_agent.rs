use weathervane_agent::{Agent, ToolSet, ToolSetBuildError};
use weathervane_tools::GetWeather;

pub const WEATHER_AGENT_NAME: &str = "Weather Assistant";

pub const WEATHER_AGENT_INSTRUCTIONS: &str = "You are a helpful weather assistant that provides \
detailed weather information. When users ask about weather, use the get_weather tool and provide \
a comprehensive response including temperature, conditions, humidity, and wind information. \
Be conversational and helpful.";

/// The single agent served by `/api/chat`.
pub fn weather_agent() -> Result<Agent, ToolSetBuildError> {
    let tools = ToolSet::new().register_with(GetWeather).build()?;
    Ok(Agent::new(WEATHER_AGENT_NAME)
        .with_instructions(WEATHER_AGENT_INSTRUCTIONS)
        .with_tools(tools))
}
