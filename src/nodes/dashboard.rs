use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::{
    Result,
    model::Message,
    nodes::{Emit, NgsiNode, NodeType, create_from, entities_of},
    runtime::{LogLevel, NodeContext},
};

/// Reshape broker data for dashboard widgets.
///
/// Entities become one numeric point per attribute, sent as separate
/// messages with `topic` set to the attribute name. STH-Comet raw history
/// and QuantumLeap results become a single chart series message.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct DashboardNode {
    /// only these attributes; all numeric ones when empty
    #[serde(default)]
    attrs: Vec<String>,
    /// series label for history that does not name its attribute
    #[serde(default)]
    series: Option<String>,
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn chart(
    series: Vec<String>,
    data: Vec<Value>,
) -> Value {
    json!([{ "series": series, "data": data, "labels": [""] }])
}

fn points(
    index: &[Value],
    values: &[Value],
) -> Value {
    Value::Array(index.iter().zip(values).filter_map(|(x, y)| number(y).map(|y| json!({"x": x, "y": y}))).collect())
}

impl DashboardNode {
    fn wanted(
        &self,
        name: &str,
    ) -> bool {
        self.attrs.is_empty() || self.attrs.iter().any(|a| a == name)
    }

    /// QuantumLeap: `{attrName, index, values}` or `{index, attributes: [{attrName, values}]}`.
    fn quantumleap(
        &self,
        result: &Map<String, Value>,
    ) -> Option<Value> {
        let index = result.get("index")?.as_array()?;
        if let Some(values) = result.get("values").and_then(Value::as_array) {
            let name = result.get("attrName").and_then(Value::as_str).map(str::to_string).or_else(|| self.series.clone()).unwrap_or_default();
            return Some(chart(vec![name], vec![points(index, values)]));
        }

        let mut series = Vec::new();
        let mut data = Vec::new();
        for attr in result.get("attributes")?.as_array()? {
            let (Some(name), Some(values)) = (attr.get("attrName").and_then(Value::as_str), attr.get("values").and_then(Value::as_array)) else {
                continue;
            };
            if self.wanted(name) {
                series.push(name.to_string());
                data.push(points(index, values));
            }
        }
        Some(chart(series, data))
    }

    /// STH-Comet raw samples: `{value: [{recvTime, attrValue}]}`.
    fn comet(
        &self,
        result: &Map<String, Value>,
    ) -> Option<Value> {
        let samples = result.get("value")?.as_array()?;
        if !samples.iter().all(|s| s.get("recvTime").is_some()) {
            return None;
        }
        let index: Vec<Value> = samples.iter().map(|s| s["recvTime"].clone()).collect();
        let values: Vec<Value> = samples.iter().map(|s| s.get("attrValue").cloned().unwrap_or(Value::Null)).collect();
        Some(chart(vec![self.series.clone().unwrap_or_default()], vec![points(&index, &values)]))
    }

    /// One `(attribute, value)` point per numeric attribute of each entity.
    fn entity_points(
        &self,
        payload: &Value,
    ) -> Vec<(String, f64)> {
        let mut out = Vec::new();
        for entity in entities_of(payload) {
            let Value::Object(obj) = entity else {
                continue;
            };
            for (name, attr) in &obj {
                if name == "id" || name == "type" || !self.wanted(name) {
                    continue;
                }
                let value = match attr {
                    Value::Object(a) => a.get("value").unwrap_or(&Value::Null),
                    other => other,
                };
                if let Some(n) = number(value) {
                    out.push((name.clone(), n));
                }
            }
        }
        out
    }
}

#[async_trait]
#[typetag::serde]
impl NgsiNode for DashboardNode {
    fn create(params: Value) -> Result<Self> {
        create_from(params, &Self::schema())
    }

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "attrs": { "type": "array", "items": { "type": "string" } },
                "series": { "type": "string" }
            }
        })
    }

    fn node_type(&self) -> NodeType {
        NodeType::ToDashboard
    }

    async fn run(
        &self,
        ctx: &NodeContext,
        msg: &mut Message,
    ) -> Result<Emit> {
        if let Value::Object(result) = &msg.payload {
            if let Some(series) = self.quantumleap(result).or_else(|| self.comet(result)) {
                msg.payload = series;
                return Ok(Emit::Message);
            }
        }

        let points = self.entity_points(&msg.payload);
        if points.is_empty() {
            ctx.emit_log(LogLevel::Warn, "no numeric attribute to chart".to_string());
            return Ok(Emit::Nothing);
        }
        for (name, value) in points {
            let mut out = msg.derive(json!(value));
            out.extra.insert("topic".to_string(), Value::String(name));
            ctx.send(out)?;
        }
        Ok(Emit::Nothing)
    }
}
