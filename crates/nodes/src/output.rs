//! Output nodes — the terminal hand-off to the rendering collaborator.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::collab::{Branding, ReportRenderer};
use crate::error::NodeError;
use crate::payload::{ArtifactRef, Payload};
use crate::traits::{parse_params, ExecutionContext, NodeCategory, NodeInput, ProcessingNode};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct OutputParams {
    pub branding: Branding,
}

/// Hands the merged upstream payload plus a branding descriptor to the
/// rendering collaborator and returns the opaque storage locator.
///
/// Output nodes are terminal: graph validation rejects any edge leaving
/// one, so nothing can depend on the artifact reference.
pub struct ReportOutputNode {
    renderer: Arc<dyn ReportRenderer>,
}

impl ReportOutputNode {
    pub fn new(renderer: Arc<dyn ReportRenderer>) -> Self {
        Self { renderer }
    }
}

#[async_trait]
impl ProcessingNode for ReportOutputNode {
    fn category(&self) -> NodeCategory {
        NodeCategory::Output
    }

    async fn execute(
        &self,
        input: NodeInput,
        params: &Value,
        ctx: &ExecutionContext,
    ) -> Result<Payload, NodeError> {
        let p: OutputParams = parse_params(params)?;
        let payload = input.merged();

        let locator = self.renderer.render(&payload, &p.branding).await?;
        info!(execution_id = %ctx.execution_id, %locator, "report rendered");

        Ok(Payload::Artifact(ArtifactRef { locator }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::InMemoryRenderer;
    use crate::payload::{Metric, Payload};

    fn ctx() -> ExecutionContext {
        ExecutionContext {
            workflow_id: uuid::Uuid::new_v4(),
            execution_id: uuid::Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn hands_payload_to_renderer_and_returns_locator() {
        let renderer = InMemoryRenderer::new();
        let node = ReportOutputNode::new(renderer.clone());

        let input = NodeInput::from_upstream(vec![(
            "dso".into(),
            Payload::Metric(Metric {
                name: "dso".into(),
                value: None,
                context: Value::Null,
            }),
        )]);
        let params = serde_json::json!({ "branding": { "company_name": "acme" } });
        let out = node.execute(input, &params, &ctx()).await.unwrap();
        match out {
            Payload::Artifact(a) => {
                assert_eq!(a.locator, "memory://reports/acme-metric.json");
            }
            other => panic!("unexpected payload: {other:?}"),
        }
        assert_eq!(renderer.rendered_count(), 1);
    }
}
