use async_trait::async_trait;
use cstage_common::params::ProbeParams;
use cstage_common::types::{MetricValue, ProbeError, ProbeResult};

use crate::Probe;

/// Diagnostic probe that returns its `msg` parameter unchanged.
///
/// Registered as `demo.echo`; used by hosts to verify the dispatch path
/// end to end without touching any subsystem.
pub struct EchoProbe;

#[async_trait]
impl Probe for EchoProbe {
    async fn execute(&self, params: &ProbeParams) -> ProbeResult {
        let msg = params
            .text("msg")
            .ok_or_else(|| ProbeError::invalid_params("missing required parameter 'msg'"))?;
        Ok(MetricValue::from(msg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cstage_common::params::{ParamKind, ParamSpec};

    #[tokio::test]
    async fn echoes_message_back() {
        let schema = [ParamSpec::required("msg", ParamKind::Text)];
        let params = ProbeParams::coerce(&schema, &["hi".to_string()]).unwrap();
        let value = EchoProbe.execute(&params).await.unwrap();
        assert_eq!(value, MetricValue::from("hi"));
    }
}
