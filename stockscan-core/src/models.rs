use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One entry of the scan history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScannedItem {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub barcode: String,
    pub item_name: String,
    pub location: String,
    pub quantity: u32,
    #[serde(rename = "isNew")]
    pub is_new: bool,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub category_name: Option<String>,
}

impl ScannedItem {
    /// Stamps a scan with a fresh id and the current time.
    pub fn from_scan(scan: NewScan) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            barcode: scan.barcode,
            item_name: scan.item_name,
            location: scan.location,
            quantity: scan.quantity,
            is_new: scan.is_new,
            category_id: scan.category_id,
            category_name: scan.category_name,
        }
    }

    pub fn same_slot(&self, barcode: &str, location: &str) -> bool {
        self.barcode == barcode && self.location == location
    }
}

/// A scan as supplied by the caller, before id and timestamp are assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct NewScan {
    pub barcode: String,
    pub item_name: String,
    pub location: String,
    pub quantity: u32,
    pub is_new: bool,
    pub category_id: Option<i64>,
    pub category_name: Option<String>,
}

/// Server push received on the stock socket.
#[derive(Debug, Clone, PartialEq)]
pub enum StockNotification {
    StockIn(StockInEvent),
    /// Any event type this client does not act on.
    Other(String),
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

impl StockNotification {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let envelope: Envelope = serde_json::from_str(text)?;
        match envelope.kind.as_str() {
            "stock_in" => Ok(Self::StockIn(serde_json::from_value(envelope.data)?)),
            _ => Ok(Self::Other(envelope.kind)),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StockInEvent {
    pub item_id: i64,
    pub item_name: String,
    pub barcode: String,
    pub location: String,
    pub quantity: u32,
    pub total_quantity: i64,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub category_name: Option<String>,
}

impl StockInEvent {
    /// Items announced over the socket are always already registered.
    pub fn into_scan(self, known_name: Option<String>) -> NewScan {
        NewScan {
            item_name: known_name.unwrap_or(self.item_name),
            barcode: self.barcode,
            location: self.location,
            quantity: self.quantity,
            is_new: false,
            category_id: self.category_id,
            category_name: self.category_name,
        }
    }
}

/// Body of `POST /stock/in`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BarcodeStockIn {
    pub barcode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
}

impl BarcodeStockIn {
    pub fn new(barcode: impl Into<String>) -> Self {
        Self {
            barcode: barcode.into(),
            location: None,
            quantity: None,
        }
    }

    pub fn at(mut self, location: Option<String>) -> Self {
        self.location = location;
        self
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StockInResponse {
    #[serde(default)]
    pub item_id: Option<i64>,
    #[serde(default)]
    pub item_name: String,
    pub barcode: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub quantity: u32,
    #[serde(default)]
    pub total_quantity: Option<i64>,
    #[serde(default)]
    pub is_new: bool,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub category_name: Option<String>,
}

impl StockInResponse {
    pub fn to_new_scan(&self) -> NewScan {
        NewScan {
            barcode: self.barcode.clone(),
            item_name: self.item_name.clone(),
            location: self.location.clone(),
            quantity: self.quantity,
            is_new: self.is_new,
            category_id: self.category_id,
            category_name: self.category_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_stock_in_notification() {
        let raw = r#"{"type":"stock_in","data":{"item_id":7,"item_name":"Widget","barcode":"123","location":"A","quantity":5,"total_quantity":12,"category_id":null,"category_name":null}}"#;
        let StockNotification::StockIn(event) = StockNotification::parse(raw).unwrap() else {
            panic!("expected stock_in");
        };
        assert_eq!(event.barcode, "123");
        assert_eq!(event.total_quantity, 12);
        assert_eq!(event.category_id, None);
    }

    #[test]
    fn unknown_notification_type_is_tolerated() {
        let raw = r#"{"type":"stock_out","data":{"anything":1}}"#;
        let parsed = StockNotification::parse(raw).unwrap();
        assert_eq!(parsed, StockNotification::Other("stock_out".into()));
    }

    #[test]
    fn stock_in_with_missing_fields_is_an_error() {
        let raw = r#"{"type":"stock_in","data":{"barcode":"123"}}"#;
        assert!(StockNotification::parse(raw).is_err());
    }

    #[test]
    fn scanned_item_uses_camel_case_is_new_on_the_wire() {
        let item = ScannedItem::from_scan(NewScan {
            barcode: "1".into(),
            item_name: "n".into(),
            location: "L".into(),
            quantity: 1,
            is_new: true,
            category_id: Some(3),
            category_name: None,
        });
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["isNew"], serde_json::Value::Bool(true));
        assert!(json["timestamp"].as_str().is_some());
        assert!(json.get("is_new").is_none());
    }

    #[test]
    fn known_name_wins_over_event_name() {
        let event = StockInEvent {
            item_id: 1,
            item_name: "Widget-v2".into(),
            barcode: "123".into(),
            location: "A".into(),
            quantity: 8,
            total_quantity: 20,
            category_id: None,
            category_name: None,
        };
        let scan = event.into_scan(Some("Widget".into()));
        assert_eq!(scan.item_name, "Widget");
        assert!(!scan.is_new);
    }
}
