//! Partner routing configuration and the downstream notification query.

use serde::{Deserialize, Serialize};

use crate::payload::TransactionPayload;

/// Partner configuration row, keyed by (short-code, routing code).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerRouting {
    pub id: i64,
    /// Delivery-notification URL. Empty means "do not notify".
    pub notification_url: String,
    pub postback_url: String,
    pub postback_counter: i64,
}

impl PartnerRouting {
    pub fn notification_target(&self) -> Option<&str> {
        let url = self.notification_url.trim();
        (!url.is_empty()).then_some(url)
    }
}

/// Query parameters sent with a delivery notification, in wire order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationParams(Vec<(&'static str, String)>);

impl NotificationParams {
    pub fn from_payload(payload: &TransactionPayload) -> Self {
        Self(vec![
            ("msisdn", payload.subscriber_id.clone()),
            ("operator", payload.operator.clone()),
            ("tran_ref", payload.tran_ref.clone()),
            ("short_code", payload.short_code.clone()),
            ("code", payload.code.clone()),
            ("desc", payload.description.clone()),
            ("timestamp", payload.timestamp.to_string()),
        ])
    }

    pub fn pairs(&self) -> &[(&'static str, String)] {
        &self.0
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_url_means_no_target() {
        let mut routing = PartnerRouting::default();
        assert_eq!(routing.notification_target(), None);
        routing.notification_url = "   ".to_string();
        assert_eq!(routing.notification_target(), None);
        routing.notification_url = "http://partner/dn".to_string();
        assert_eq!(routing.notification_target(), Some("http://partner/dn"));
    }

    #[test]
    fn params_cover_the_notification_fields() {
        let payload = TransactionPayload {
            subscriber_id: "0812345678".to_string(),
            operator: "AIS".to_string(),
            tran_ref: "TX1".to_string(),
            short_code: "1234".to_string(),
            code: "00".to_string(),
            description: "ok".to_string(),
            timestamp: 1_700_000_000,
            return_status: "SUCCESS".to_string(),
        };
        let params = NotificationParams::from_payload(&payload);
        let names: Vec<_> = params.pairs().iter().map(|(k, _)| *k).collect();
        assert_eq!(
            names,
            ["msisdn", "operator", "tran_ref", "short_code", "code", "desc", "timestamp"]
        );
        assert_eq!(params.get("timestamp"), Some("1700000000"));
        assert_eq!(params.get("cyberus-return"), None);
    }
}
