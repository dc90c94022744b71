use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    Result,
    model::Message,
    ngsi::codec,
    nodes::{Emit, NgsiNode, NodeType, create_from},
    runtime::NodeContext,
};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Direction {
    #[default]
    Encode,
    Decode,
}

/// Escape or restore reserved characters in the payload without calling a broker.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct EncodeDecodeNode {
    #[serde(default)]
    direction: Direction,
    /// the payload holds entities in key-value form
    #[serde(default)]
    key_values: bool,
}

#[async_trait]
#[typetag::serde]
impl NgsiNode for EncodeDecodeNode {
    fn create(params: Value) -> Result<Self> {
        create_from(params, &Self::schema())
    }

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "direction": { "type": "string", "enum": ["encode", "decode"] },
                "keyValues": { "type": "boolean" }
            }
        })
    }

    fn node_type(&self) -> NodeType {
        NodeType::EncodeDecode
    }

    async fn run(
        &self,
        _ctx: &NodeContext,
        msg: &mut Message,
    ) -> Result<Emit> {
        msg.payload = match self.direction {
            Direction::Encode => codec::encode_entities(&msg.payload, true, self.key_values),
            Direction::Decode => codec::decode_entities(&msg.payload, true, self.key_values),
        };
        Ok(Emit::Message)
    }
}
