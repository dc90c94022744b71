use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::{
    Result,
    model::Message,
    nodes::{Emit, NgsiNode, NodeType, create_from, entities_of},
    runtime::{LogLevel, NodeContext},
};

fn default_location() -> String {
    "location".to_string()
}

fn default_icon() -> String {
    "fa-map-marker".to_string()
}

/// Turn entities or notifications into world-map markers.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct WorldmapNode {
    /// attribute holding the position
    #[serde(default = "default_location")]
    location: String,
    #[serde(default = "default_icon")]
    icon: String,
    #[serde(default)]
    icon_color: Option<String>,
    /// map layer; the entity type when unset
    #[serde(default)]
    layer: Option<String>,
}

impl Default for WorldmapNode {
    fn default() -> Self {
        Self {
            location: default_location(),
            icon: default_icon(),
            icon_color: None,
            layer: None,
        }
    }
}

/// Bare value of an attribute in either normalized or key-value form.
fn attr_value(attr: &Value) -> &Value {
    match attr {
        Value::Object(obj) if obj.contains_key("value") && obj.contains_key("type") => &obj["value"],
        other => other,
    }
}

/// `(lat, lon)` from a GeoJSON point or a `"lat, lon"` string.
fn position(location: &Value) -> Option<(f64, f64)> {
    match attr_value(location) {
        Value::String(s) => {
            let mut parts = s.split(',').map(|p| p.trim().parse::<f64>());
            match (parts.next(), parts.next(), parts.next()) {
                (Some(Ok(lat)), Some(Ok(lon)), None) => Some((lat, lon)),
                _ => None,
            }
        }
        Value::Object(geo) if geo.get("type").and_then(Value::as_str) == Some("Point") => {
            let coords = geo.get("coordinates")?.as_array()?;
            Some((coords.get(1)?.as_f64()?, coords.first()?.as_f64()?))
        }
        _ => None,
    }
}

impl WorldmapNode {
    fn marker(
        &self,
        entity: &Value,
    ) -> Option<Value> {
        let obj = entity.as_object()?;
        let (lat, lon) = position(obj.get(&self.location)?)?;

        let mut marker = Map::new();
        marker.insert("name".to_string(), obj.get("id").cloned().unwrap_or(Value::Null));
        marker.insert("lat".to_string(), json!(lat));
        marker.insert("lon".to_string(), json!(lon));
        marker.insert("icon".to_string(), json!(self.icon));
        if let Some(color) = &self.icon_color {
            marker.insert("iconColor".to_string(), json!(color));
        }
        let layer = self.layer.clone().or_else(|| obj.get("type").and_then(Value::as_str).map(str::to_string));
        if let Some(layer) = layer {
            marker.insert("layer".to_string(), json!(layer));
        }
        for (name, attr) in obj {
            if name == "id" || name == "type" || *name == self.location || marker.contains_key(name) {
                continue;
            }
            marker.insert(name.clone(), attr_value(attr).clone());
        }
        Some(Value::Object(marker))
    }
}

#[async_trait]
#[typetag::serde]
impl NgsiNode for WorldmapNode {
    fn create(params: Value) -> Result<Self> {
        create_from(params, &Self::schema())
    }

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "location": { "type": "string", "minLength": 1 },
                "icon": { "type": "string" },
                "iconColor": { "type": "string" },
                "layer": { "type": "string" }
            }
        })
    }

    fn node_type(&self) -> NodeType {
        NodeType::ToWorldmap
    }

    async fn run(
        &self,
        ctx: &NodeContext,
        msg: &mut Message,
    ) -> Result<Emit> {
        let single = msg.payload.is_object() && !msg.payload.as_object().is_some_and(|o| o.contains_key("subscriptionId"));
        let markers: Vec<Value> = entities_of(&msg.payload).iter().filter_map(|e| self.marker(e)).collect();
        if markers.is_empty() {
            ctx.emit_log(LogLevel::Warn, format!("no entity with a '{}' position", self.location));
            return Ok(Emit::Nothing);
        }

        msg.payload = match (single, markers.len()) {
            (true, 1) => markers.into_iter().next().unwrap_or(Value::Null),
            _ => Value::Array(markers),
        };
        Ok(Emit::Message)
    }
}
