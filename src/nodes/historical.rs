use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::{
    Result,
    config::GeType,
    model::Message,
    ngsi::{ActionConfig, ActionType, Decoding, HttpMethod, RequestBuilder, pagination::TOTAL_COUNT_HEADER},
    nodes::{Emit, InputMode, NgsiNode, NodeType, create_from, finish, merge_config, payload_id},
    runtime::NodeContext,
    utils::time,
};

const FIELDS: [&str; 12] = ["id", "type", "attrName", "lastN", "hLimit", "hOffset", "dateFrom", "dateTo", "period", "aggrMethod", "aggrPeriod", "count"];
const DEFAULT_LIMIT: u64 = 100;

/// Raw or aggregated attribute history from STH-Comet.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HistoricalNode {
    #[serde(default)]
    mode: InputMode,
    #[serde(flatten)]
    settings: Map<String, Value>,
}

/// Resolve a relative `period` into `from` / `to` unless either bound is set.
pub(crate) fn apply_period(
    config: &mut ActionConfig,
    from_key: &str,
    to_key: &str,
) -> Result<()> {
    let Some(period) = config.string("period") else {
        return Ok(());
    };
    if config.get(from_key).is_some() || config.get(to_key).is_some() {
        return Ok(());
    }
    let (from, to) = time::period_range(&period, Utc::now())?;
    config.set(from_key, from);
    config.set(to_key, to);
    Ok(())
}

#[async_trait]
#[typetag::serde]
impl NgsiNode for HistoricalNode {
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
                "lastN": { "type": ["integer", "string"] },
                "aggrMethod": { "type": "string", "enum": ["max", "min", "sum", "sum2", "occur"] },
                "aggrPeriod": { "type": "string", "enum": ["second", "minute", "hour", "day", "month"] },
                "period": { "type": "string" }
            }
        })
    }

    fn node_type(&self) -> NodeType {
        NodeType::Historical
    }

    async fn run(
        &self,
        ctx: &NodeContext,
        msg: &mut Message,
    ) -> Result<Emit> {
        let broker = ctx.broker(GeType::Comet)?;
        let scope = ctx.resolve_scope(msg);
        let mut config = merge_config(&json!({}), &self.settings, self.mode, &msg.payload, &FIELDS)?;
        if config.get("id").is_none() && self.mode == InputMode::Config {
            if let Some(id) = payload_id(&msg.payload) {
                config.set("id", id);
            }
        }
        apply_period(&mut config, "dateFrom", "dateTo")?;

        let id = config.require("id")?;
        let entity_type = config.require("type")?;
        let attr_name = config.require("attrName")?;

        let mut builder = RequestBuilder::new(HttpMethod::GET, &broker.service_url, "/STH/v2/entities")
            .segment(&id)
            .segment("attrs")
            .segment(&attr_name)
            .query("type", entity_type)
            .query_from(&config, &["aggrMethod", "aggrPeriod", "lastN", "hLimit", "hOffset", "dateFrom", "dateTo"]);
        // raw queries need either lastN or a page
        if config.get("aggrMethod").is_none() && config.get("lastN").is_none() {
            let limit = config.number("hLimit")?.unwrap_or(DEFAULT_LIMIT);
            builder = builder.query("hLimit", limit.to_string()).query("hOffset", config.number("hOffset")?.unwrap_or(0).to_string());
        }
        if config.flag("count") {
            builder = builder.query("count", "true");
        }

        let reply = ctx.call(broker, builder, &scope, ActionType::Read, Decoding::default()).await?;
        let total = reply.header(TOTAL_COUNT_HEADER).and_then(|v| v.trim().parse::<u64>().ok());
        finish(ctx, msg, &scope, reply, "reading historical data", total);
        Ok(Emit::Message)
    }
}
