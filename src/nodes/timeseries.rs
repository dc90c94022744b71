use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::{
    NgsiError, Result,
    config::GeType,
    model::Message,
    ngsi::{ActionConfig, ActionType, Decoding, HttpMethod, RequestBuilder},
    nodes::{Emit, InputMode, NgsiNode, NodeType, create_from, finish, historical::apply_period, merge_config},
    runtime::NodeContext,
};

const FIELDS: [&str; 17] = [
    "id",
    "type",
    "attrName",
    "valueOnly",
    "aggrMethod",
    "aggrPeriod",
    "aggrScope",
    "fromDate",
    "toDate",
    "period",
    "lastN",
    "limit",
    "offset",
    "georel",
    "geometry",
    "coords",
    "attrs",
];

const QUERY: [&str; 13] = ["attrs", "aggrMethod", "aggrPeriod", "aggrScope", "fromDate", "toDate", "lastN", "limit", "offset", "georel", "geometry", "coords", "type"];

/// Time-series queries against QuantumLeap.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TimeseriesNode {
    #[serde(default)]
    mode: InputMode,
    #[serde(flatten)]
    settings: Map<String, Value>,
}

/// Path for the most specific target the config names.
fn target(
    host: &str,
    config: &ActionConfig,
) -> Result<RequestBuilder> {
    let builder = |base| RequestBuilder::new(HttpMethod::GET, host, base);
    let attr = config.string("attrName");
    let builder = match (config.string("id"), config.string("type"), &attr) {
        (Some(id), _, _) => builder("/v2/entities").segment(&id),
        (None, Some(entity_type), _) => builder("/v2/types").segment(&entity_type),
        (None, None, Some(_)) => builder("/v2/attrs"),
        (None, None, None) => return Err(NgsiError::missing("id")),
    };
    Ok(match attr {
        Some(attr) if config.get("id").is_some() || config.get("type").is_some() => builder.segment("attrs").segment(&attr),
        Some(attr) => builder.segment(&attr),
        None => builder,
    })
}

#[async_trait]
#[typetag::serde]
impl NgsiNode for TimeseriesNode {
    fn create(params: Value) -> Result<Self> {
        create_from(params, &Self::schema())
    }

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "mode": { "type": "string", "enum": ["config", "payload"] },
                "id": { "type": "string" },
                "type": { "type": "string" },
                "attrName": { "type": "string" },
                "valueOnly": { "type": "boolean" },
                "aggrMethod": { "type": "string", "enum": ["count", "sum", "avg", "min", "max"] },
                "aggrPeriod": { "type": "string", "enum": ["year", "month", "day", "hour", "minute", "second"] },
                "period": { "type": "string" }
            }
        })
    }

    fn node_type(&self) -> NodeType {
        NodeType::Timeseries
    }

    async fn run(
        &self,
        ctx: &NodeContext,
        msg: &mut Message,
    ) -> Result<Emit> {
        let broker = ctx.broker(GeType::Quantumleap)?;
        let scope = ctx.resolve_scope(msg);
        let mut config = merge_config(&json!({}), &self.settings, self.mode, &msg.payload, &FIELDS)?;
        apply_period(&mut config, "fromDate", "toDate")?;

        let mut keys = QUERY.to_vec();
        if config.get("id").is_none() {
            // the type is already in the path
            keys.retain(|k| *k != "type");
        }
        let builder = target(&broker.service_url, &config)?.value_suffix(config.flag("valueOnly")).query_from(&config, &keys);

        let reply = ctx.call(broker, builder, &scope, ActionType::Read, Decoding::default()).await?;
        finish(ctx, msg, &scope, reply, "reading time series", None);
        Ok(Emit::Message)
    }
}
