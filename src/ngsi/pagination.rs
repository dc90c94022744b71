//! Sequential pagination over listing endpoints.
//!
//! Pages are requested one after the other: each offset depends on what
//! the previous page returned. Output is delegated to a [`PageSink`].

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::{
    Result,
    auth::TokenProvider,
    model::Message,
    ngsi::{ActionType, Decoding, RequestBuilder, ResponseOutcome, Scope, context, response},
    runtime::NodeContext,
    transport::HttpTransport,
};

pub const TOTAL_COUNT_HEADER: &str = "fiware-total-count";

#[async_trait]
pub trait PageSink: Send {
    /// Receives every non-empty page, in order.
    async fn page(
        &mut self,
        items: Vec<Value>,
        total: Option<u64>,
    ) -> Result<()>;
}

/// How a listing ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PageEnd {
    Completed {
        total: Option<u64>,
        count: u64,
    },
    Failed(ResponseOutcome),
}

/// Fetch pages until an empty page, or until `fiware-total-count` items
/// have been seen. A zero or absent total stops after the first page.
pub async fn paginate(
    transport: &dyn HttpTransport,
    token: Option<&dyn TokenProvider>,
    scope: &Scope,
    request: &(dyn Fn(u64) -> RequestBuilder + Send + Sync),
    decoding: Decoding,
    sink: &mut dyn PageSink,
) -> Result<PageEnd> {
    let mut page = 0;
    let mut count = 0;
    let mut total: Option<u64>;

    loop {
        let descriptor = request(page).build(scope, token).await?;
        let result = transport.send(&descriptor).await;
        total = result.as_ref().ok().and_then(|r| r.header(TOTAL_COUNT_HEADER)).and_then(|v| v.trim().parse::<u64>().ok());

        let items = match response::classify_result(ActionType::Read, result, decoding) {
            ResponseOutcome::Success {
                body,
                ..
            } => match body {
                Some(Value::Array(items)) => items,
                Some(Value::Null) | None => Vec::new(),
                Some(other) => vec![other],
            },
            failed => return Ok(PageEnd::Failed(failed)),
        };

        debug!(page, items = items.len(), ?total, "page received");
        if items.is_empty() {
            break;
        }

        count += items.len() as u64;
        sink.page(items, total).await?;

        match total {
            Some(t) if t > 0 && count < t => page += 1,
            _ => break,
        }
    }

    Ok(PageEnd::Completed {
        total,
        count,
    })
}

/// Collects every page and hands them over once paging is done.
#[derive(Debug, Default)]
pub struct BufferingSink {
    items: Vec<Value>,
}

impl BufferingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_items(self) -> Vec<Value> {
        self.items
    }
}

#[async_trait]
impl PageSink for BufferingSink {
    async fn page(
        &mut self,
        items: Vec<Value>,
        _total: Option<u64>,
    ) -> Result<()> {
        self.items.extend(items);
        Ok(())
    }
}

/// Emits one message per page as soon as it arrives.
pub struct StreamingSink<'a> {
    ctx: &'a NodeContext,
    template: &'a Message,
    scope: Scope,
    pages: u64,
}

impl<'a> StreamingSink<'a> {
    pub fn new(
        ctx: &'a NodeContext,
        template: &'a Message,
        scope: Scope,
    ) -> Self {
        Self {
            ctx,
            template,
            scope,
            pages: 0,
        }
    }

    pub fn pages(&self) -> u64 {
        self.pages
    }
}

#[async_trait]
impl PageSink for StreamingSink<'_> {
    async fn page(
        &mut self,
        items: Vec<Value>,
        total: Option<u64>,
    ) -> Result<()> {
        let mut msg = self.template.derive(Value::Array(items));
        msg.status_code = Some(200);
        context::stamp(&mut msg, &self.scope, total);
        self.pages += 1;
        self.ctx.send(msg)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        ngsi::HttpMethod,
        transport::{HttpResponse, mock::MockTransport},
    };

    fn listing(page: u64) -> RequestBuilder {
        RequestBuilder::new(HttpMethod::GET, "http://orion:1026", "/v2/entities").options(&["count"]).page(page, 5)
    }

    fn items(n: usize) -> Value {
        Value::Array((0..n).map(|i| json!({"id": format!("E{}", i), "type": "T"})).collect())
    }

    #[tokio::test]
    async fn test_stops_at_total_count() {
        let transport = MockTransport::new();
        transport.push(HttpResponse::new(200).with_header("Fiware-Total-Count", "10").with_body(items(5)));
        transport.push(HttpResponse::new(200).with_header("Fiware-Total-Count", "10").with_body(items(5)));

        let mut sink = BufferingSink::new();
        let end = paginate(&transport, None, &Scope::default(), &listing, Decoding::default(), &mut sink).await.unwrap();

        assert_eq!(
            end,
            PageEnd::Completed {
                total: Some(10),
                count: 10
            }
        );
        let offsets: Vec<String> = transport.requests().iter().map(|r| r.query_param("offset").unwrap().to_string()).collect();
        assert_eq!(offsets, vec!["0", "5"]);
        assert_eq!(sink.into_items().len(), 10);
    }

    #[tokio::test]
    async fn test_empty_first_page_single_request() {
        let transport = MockTransport::new();
        transport.push(HttpResponse::new(200).with_header("fiware-total-count", "10").with_body(json!([])));

        let mut sink = BufferingSink::new();
        let end = paginate(&transport, None, &Scope::default(), &listing, Decoding::default(), &mut sink).await.unwrap();

        assert_eq!(
            end,
            PageEnd::Completed {
                total: Some(10),
                count: 0
            }
        );
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_zero_or_absent_total_stops_after_first_page() {
        let transport = MockTransport::new();
        transport.push(HttpResponse::new(200).with_header("fiware-total-count", "0").with_body(items(1)));
        let mut sink = BufferingSink::new();
        paginate(&transport, None, &Scope::default(), &listing, Decoding::default(), &mut sink).await.unwrap();
        assert_eq!(transport.requests().len(), 1);
        assert_eq!(sink.into_items().len(), 1);

        let transport = MockTransport::new();
        transport.push(HttpResponse::new(200).with_body(items(5)));
        let mut sink = BufferingSink::new();
        paginate(&transport, None, &Scope::default(), &listing, Decoding::default(), &mut sink).await.unwrap();
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_page_reports_outcome() {
        let transport = MockTransport::new();
        transport.push(HttpResponse::new(200).with_header("fiware-total-count", "10").with_body(items(5)));
        transport.push(HttpResponse::new(500).with_body(json!({"error": "InternalError"})));

        let mut sink = BufferingSink::new();
        let end = paginate(&transport, None, &Scope::default(), &listing, Decoding::default(), &mut sink).await.unwrap();
        match end {
            PageEnd::Failed(outcome) => assert_eq!(outcome.status_code(), 500),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_pages_are_decoded() {
        let transport = MockTransport::new();
        transport.push(HttpResponse::new(200).with_header("fiware-total-count", "1").with_body(json!([{"id": "E1", "type": "T", "name": "%3Cabc%3E"}])));

        let mut sink = BufferingSink::new();
        let decoding = Decoding {
            forbidden: true,
            key_values: true,
            ..Default::default()
        };
        paginate(&transport, None, &Scope::default(), &listing, decoding, &mut sink).await.unwrap();
        assert_eq!(sink.into_items()[0]["name"], json!("<abc>"));
    }
}
