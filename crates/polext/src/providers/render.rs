use super::Renderer;
use crate::error::RenderError;
use crate::model::PolicyExtract;

/// Renders the aggregated extract as pretty-printed JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn render(&self, policy_type: &str, extract: &PolicyExtract) -> Result<String, RenderError> {
        serde_json::to_string_pretty(extract).map_err(|e| RenderError::Failed {
            policy_type: policy_type.to_string(),
            reason: e.to_string(),
        })
    }
}
