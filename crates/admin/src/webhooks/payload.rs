//! Decoding of inbound webhook bodies.
//!
//! Two shapes arrive on the same endpoint:
//!
//! - current: `{"event": "stock.updated", "eventId": "...", "data": {...}}`
//! - legacy: `{"retorno": {"estoques": [{"estoque": {...}}]}}` or
//!   `{"retorno": {"produtos": [{"produto": {...}}]}}`, one event per entry
//!
//! Legacy bodies carry no event id, so one is derived from the body hash and
//! the entry's position.

use serde::{Deserialize, Deserializer};
use sha2::{Digest, Sha256};

use vitrine_core::{ErpId, EventKind};

use super::WebhookError;
use crate::catalog::text::fold;

/// One event decoded from a webhook body.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingEvent {
    pub event_id: String,
    /// Event name as sent by the ERP.
    pub event_type: String,
    pub kind: EventKind,
    /// The event reports a deletion.
    pub deleted: bool,
    pub external_id: Option<ErpId>,
    /// Stock quantity carried by the event, if any.
    pub quantity: Option<i32>,
    /// The event's own JSON, stored in the ledger.
    pub payload: serde_json::Value,
}

/// Category of an event name.
///
/// Stock keywords win over product ones so `product.stock.updated` is a
/// stock event.
#[must_use]
pub fn classify_event(name: &str) -> EventKind {
    let name = fold(name);
    let has = |words: &[&str]| words.iter().any(|w| name.contains(w));

    if has(&["stock", "estoque", "saldo"]) {
        EventKind::Stock
    } else if has(&["product", "produto"]) {
        EventKind::Product
    } else if has(&["order", "pedido", "venda"]) {
        EventKind::Order
    } else if has(&["invoice", "nota", "nfe"]) {
        EventKind::Invoice
    } else {
        EventKind::Unknown
    }
}

/// Whether an event name reports a deletion.
#[must_use]
pub fn is_deletion(name: &str) -> bool {
    let name = fold(name);
    ["delete", "exclu", "remov"].iter().any(|w| name.contains(w))
}

/// Decode a body into its events.
///
/// # Errors
///
/// Returns `WebhookError::InvalidPayload` if the body is not JSON or matches
/// neither shape.
pub fn parse_events(body: &[u8]) -> Result<Vec<IncomingEvent>, WebhookError> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| WebhookError::InvalidPayload(format!("invalid JSON: {e}")))?;

    if value.get("retorno").is_some() {
        let wire: LegacyWire = serde_json::from_value(value)
            .map_err(|e| WebhookError::InvalidPayload(format!("invalid legacy payload: {e}")))?;
        return Ok(legacy_events(wire, &body_digest(body)));
    }

    let wire: CurrentWire = serde_json::from_value(value.clone())
        .map_err(|e| WebhookError::InvalidPayload(format!("invalid event payload: {e}")))?;
    let event_id = wire
        .event_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| body_digest(body));

    Ok(vec![IncomingEvent {
        kind: classify_event(&wire.event),
        deleted: is_deletion(&wire.event),
        external_id: wire.data.external_id(),
        quantity: wire.data.quantity(),
        event_id,
        event_type: wire.event,
        payload: value,
    }])
}

fn body_digest(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

fn legacy_events(wire: LegacyWire, digest: &str) -> Vec<IncomingEvent> {
    let stock = wire
        .retorno
        .estoques
        .into_iter()
        .map(|entry| ("estoque", EventKind::Stock, entry.estoque));
    let products = wire
        .retorno
        .produtos
        .into_iter()
        .map(|entry| ("produto", EventKind::Product, entry.produto));

    stock
        .chain(products)
        .enumerate()
        .map(|(index, (event_type, kind, data))| IncomingEvent {
            event_id: format!("{digest}:{index}"),
            event_type: event_type.to_string(),
            kind,
            deleted: false,
            external_id: data.external_id(),
            quantity: data.quantity(),
            payload: data.raw,
        })
        .collect()
}

// =============================================================================
// Wire formats
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurrentWire {
    event: String,
    #[serde(default, alias = "event_id")]
    event_id: Option<String>,
    #[serde(default)]
    data: EventDataWire,
}

#[derive(Debug, Deserialize)]
struct LegacyWire {
    retorno: LegacyBodyWire,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LegacyBodyWire {
    estoques: Vec<LegacyStockWire>,
    produtos: Vec<LegacyProductWire>,
}

#[derive(Debug, Deserialize)]
struct LegacyStockWire {
    estoque: EventDataWire,
}

#[derive(Debug, Deserialize)]
struct LegacyProductWire {
    produto: EventDataWire,
}

/// Fields shared by every event body, all optional.
#[derive(Debug, Default)]
struct EventDataWire {
    id: Option<i64>,
    product_id: Option<i64>,
    quantity: Option<f64>,
    raw: serde_json::Value,
}

impl EventDataWire {
    fn external_id(&self) -> Option<ErpId> {
        self.product_id.or(self.id).filter(|id| *id > 0).map(ErpId::new)
    }

    fn quantity(&self) -> Option<i32> {
        self.quantity.map(crate::erp::types::quantity)
    }
}

impl<'de> Deserialize<'de> for EventDataWire {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;

        let id = raw
            .get("idProduto")
            .or_else(|| raw.get("id"))
            .and_then(lenient_i64);
        let product_id = ["produto", "product"]
            .iter()
            .find_map(|key| raw.get(*key)?.get("id"))
            .and_then(lenient_i64);
        let quantity = ["saldoVirtualTotal", "estoqueAtual", "saldo", "quantity"]
            .iter()
            .find_map(|key| raw.get(*key).and_then(lenient_f64))
            .or_else(|| {
                raw.get("estoque")?
                    .get("saldoVirtualTotal")
                    .and_then(lenient_f64)
            });

        Ok(Self {
            id,
            product_id,
            quantity,
            raw,
        })
    }
}

/// A number that may arrive as a JSON string.
fn lenient_i64(value: &serde_json::Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_str()?.trim().parse().ok())
}

fn lenient_f64(value: &serde_json::Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str()?.trim().replace(',', ".").parse().ok())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_event() {
        assert_eq!(classify_event("stock.updated"), EventKind::Stock);
        assert_eq!(classify_event("product.stock.changed"), EventKind::Stock);
        assert_eq!(classify_event("Produto alterado"), EventKind::Product);
        assert_eq!(classify_event("order.created"), EventKind::Order);
        assert_eq!(classify_event("nota_fiscal.autorizada"), EventKind::Invoice);
        assert_eq!(classify_event("contact.updated"), EventKind::Unknown);
    }

    #[test]
    fn test_is_deletion() {
        assert!(is_deletion("product.deleted"));
        assert!(is_deletion("produto_excluído"));
        assert!(is_deletion("product.removed"));
        assert!(!is_deletion("product.updated"));
    }

    #[test]
    fn test_current_shape() {
        let body = br#"{"event":"stock.updated","eventId":"evt-1","data":{"id":1002,"saldoVirtualTotal":7.0}}"#;
        let events = parse_events(body).unwrap();
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.event_id, "evt-1");
        assert_eq!(event.kind, EventKind::Stock);
        assert_eq!(event.external_id, Some(ErpId::new(1002)));
        assert_eq!(event.quantity, Some(7));
        assert!(!event.deleted);
        assert_eq!(event.payload["eventId"], "evt-1");
    }

    #[test]
    fn test_nested_product_reference_wins() {
        let body = br#"{"event":"stock.updated","eventId":"evt-2","data":{"id":55,"produto":{"id":"1003"},"estoqueAtual":"3"}}"#;
        let event = parse_events(body).unwrap().remove(0);
        assert_eq!(event.external_id, Some(ErpId::new(1003)));
        assert_eq!(event.quantity, Some(3));
    }

    #[test]
    fn test_missing_event_id_uses_body_hash() {
        let body = br#"{"event":"product.deleted","data":{"id":501}}"#;
        let first = parse_events(body).unwrap().remove(0);
        let second = parse_events(body).unwrap().remove(0);
        assert_eq!(first.event_id, second.event_id);
        assert_eq!(first.event_id.len(), 64);
        assert!(first.deleted);
        assert_eq!(first.kind, EventKind::Product);
    }

    #[test]
    fn test_legacy_shape_splits_entries() {
        let body = serde_json::to_vec(&serde_json::json!({
            "retorno": {
                "estoques": [
                    { "estoque": { "idProduto": "1001", "saldo": "4" } },
                    { "estoque": { "idProduto": 1002, "saldo": 0 } }
                ],
                "produtos": [ { "produto": { "id": 501, "nome": "Sandália Laura" } } ]
            }
        }))
        .unwrap();
        let events = parse_events(&body).unwrap();
        assert_eq!(events.len(), 3);

        assert_eq!(events[0].kind, EventKind::Stock);
        assert_eq!(events[0].external_id, Some(ErpId::new(1001)));
        assert_eq!(events[0].quantity, Some(4));
        assert!(events[0].event_id.ends_with(":0"));

        assert_eq!(events[1].quantity, Some(0));
        assert!(events[1].event_id.ends_with(":1"));

        assert_eq!(events[2].kind, EventKind::Product);
        assert_eq!(events[2].external_id, Some(ErpId::new(501)));
        assert_eq!(events[2].quantity, None);
        assert_eq!(events[2].payload["nome"], "Sandália Laura");
    }

    #[test]
    fn test_invalid_bodies() {
        assert!(matches!(parse_events(b"not json"), Err(WebhookError::InvalidPayload(_))));
        assert!(matches!(parse_events(br#"{"data":{}}"#), Err(WebhookError::InvalidPayload(_))));
    }
}
