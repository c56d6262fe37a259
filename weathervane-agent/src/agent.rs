use crate::ToolSet;

/// An agent definition: who the model is told it is, and which tools it may
/// call. Agents are immutable once built and shared across runs.
#[derive(Clone, Debug)]
pub struct Agent {
    name: String,
    instructions: String,
    model: Option<String>,
    tools: ToolSet,
}

impl Agent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: String::new(),
            model: None,
            tools: ToolSet::default(),
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    /// Override the client's default model for this agent.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_tools(mut self, tools: ToolSet) -> Self {
        self.tools = tools;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn tools(&self) -> &ToolSet {
        &self.tools
    }
}
