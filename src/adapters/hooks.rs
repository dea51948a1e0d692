use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::domain::station::Station;

pub type MessageRewrite = Arc<dyn Fn(&str, Value) -> Value + Send + Sync>;
pub type StationPartnerIdSelector = Arc<dyn Fn(&Station) -> Option<String> + Send + Sync>;
pub type ConnectorPartnerIdSelector = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

// Pure, synchronous customization points. Rewrites see the operation name
// and the full message; id selectors may override the partner-facing
// identifier per entity. None of these may perform I/O.
#[derive(Clone, Default)]
pub struct CustomizationHooks {
    pub outgoing_rewrite: Option<MessageRewrite>,
    pub incoming_rewrite: Option<MessageRewrite>,
    pub station_partner_id: Option<StationPartnerIdSelector>,
    pub connector_partner_id: Option<ConnectorPartnerIdSelector>,
}

impl CustomizationHooks {
    pub fn apply_outgoing(&self, operation: &str, body: Value) -> Value {
        match &self.outgoing_rewrite {
            Some(rewrite) => rewrite(operation, body),
            None => body,
        }
    }

    pub fn apply_incoming(&self, operation: &str, body: Value) -> Value {
        match &self.incoming_rewrite {
            Some(rewrite) => rewrite(operation, body),
            None => body,
        }
    }

    pub fn partner_id_for_station(&self, station: &Station, default: &str) -> String {
        self.station_partner_id
            .as_ref()
            .and_then(|select| select(station))
            .unwrap_or_else(|| default.to_string())
    }

    pub fn partner_id_for_connector(&self, connector_id: &str, default: &str) -> String {
        self.connector_partner_id
            .as_ref()
            .and_then(|select| select(connector_id))
            .unwrap_or_else(|| default.to_string())
    }
}

impl fmt::Debug for CustomizationHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomizationHooks")
            .field("outgoing_rewrite", &self.outgoing_rewrite.is_some())
            .field("incoming_rewrite", &self.incoming_rewrite.is_some())
            .field("station_partner_id", &self.station_partner_id.is_some())
            .field("connector_partner_id", &self.connector_partner_id.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::CustomizationHooks;
    use crate::domain::station::{Connector, ConnectorType, StationDraft};

    #[test]
    fn defaults_pass_messages_and_ids_through() {
        let hooks = CustomizationHooks::default();

        let body = json!({"rfid-verify": {"rfid": "CAFEBABE"}});
        assert_eq!(hooks.apply_outgoing("rfid-verify", body.clone()), body);
        assert_eq!(hooks.apply_incoming("rfid-verify", body.clone()), body);
        assert_eq!(
            hooks.partner_id_for_connector("DE*8PS*E1", "partner-1"),
            "partner-1"
        );
    }

    #[test]
    fn rewrite_and_selector_hooks_are_applied() {
        let hooks = CustomizationHooks {
            outgoing_rewrite: Some(Arc::new(|_, mut body| {
                body["marker"] = json!(true);
                body
            })),
            station_partner_id: Some(Arc::new(|station| {
                Some(format!("partner-for-{}", station.id))
            })),
            ..CustomizationHooks::default()
        };

        let rewritten = hooks.apply_outgoing("station-post", json!({}));
        assert_eq!(rewritten["marker"], json!(true));

        let station = StationDraft {
            id: "DE*8PS*S1".to_string(),
            name: "Station".to_string(),
            connectors: vec![Connector {
                id: "DE*8PS*E1".to_string(),
                connector_type: ConnectorType::Type2,
                speed_kw: 11.0,
            }],
            ..StationDraft::default()
        }
        .build()
        .expect("draft must build");

        assert_eq!(
            hooks.partner_id_for_station(&station, "partner-1"),
            "partner-for-DE*8PS*S1"
        );
    }
}
