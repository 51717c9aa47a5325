use serde_json::Value;

/// One request to the model: instructions, input items, and the tool
/// schemas it may call. `previous_response_id` continues an earlier
/// response instead of resending history.
#[derive(Debug, Clone, Default)]
pub struct ModelRequest<'a> {
    pub instructions: Option<&'a str>,
    pub input: Vec<Value>,
    pub tools: &'a [Value],
    pub previous_response_id: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCall {
    pub name: String,
    pub call_id: String,
    /// JSON-encoded arguments as sent by the model.
    pub arguments: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelResponse {
    pub id: String,
    pub output_text: String,
    pub function_calls: Vec<FunctionCall>,
}

/// Anything that turns a request into a response. The chat driver only
/// sees this trait.
pub trait ModelClient {
    fn respond(&self, request: &ModelRequest<'_>) -> anyhow::Result<ModelResponse>;

    fn model_name(&self) -> &str;
}
