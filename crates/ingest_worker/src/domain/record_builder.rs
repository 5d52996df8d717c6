use chrono::{DateTime, SecondsFormat, Utc};
use common::domain::{
    message_type_code, EventKind, LedgerRecord, LedgerSettings, QueueMessage, QueuedEvent,
};
use serde_json::{json, Map, Value};

/// Key under which non-object event bodies are stored
const PAYLOAD_KEY: &str = "payload";
const METADATA_KEY: &str = "_metadata";
const NEW_TENANT_EVENT_TYPE: &str = "new_tenant_identified";

/// Builds ledger records from dequeued events using the event kind table
#[derive(Debug, Clone, Copy, Default)]
pub struct LedgerRecordBuilder {
    settings: LedgerSettings,
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Numeric type and code for `_metadata`.
///
/// Chat messages carry their own subtype in the body; every other kind uses
/// its fixed entry from the kind table.
fn event_type(kind: EventKind, body: &Value) -> (Option<u64>, &'static str) {
    match kind {
        EventKind::MessageCreate => match body.get("type").and_then(Value::as_u64) {
            Some(message_type) => (Some(message_type), message_type_code(message_type)),
            None => (None, "UNKNOWN"),
        },
        _ => {
            let descriptor = kind.descriptor();
            (
                descriptor.type_number.map(u64::from),
                descriptor.type_code,
            )
        }
    }
}

impl LedgerRecordBuilder {
    pub fn new(settings: LedgerSettings) -> Self {
        Self { settings }
    }

    /// Record for an event attributed to a resolved workspace
    pub fn event_record(
        &self,
        workspace_id: i64,
        message: &QueueMessage,
        queued: &QueuedEvent,
        processed_at: DateTime<Utc>,
    ) -> LedgerRecord {
        let envelope = &queued.event;
        let descriptor = envelope.kind.descriptor();

        let mut data = match &envelope.body {
            Value::Object(map) => map.clone(),
            other => {
                let mut map = Map::new();
                map.insert(PAYLOAD_KEY.to_string(), other.clone());
                map
            }
        };

        if let (Some(key), Some(previous)) = (descriptor.previous_key, &envelope.previous) {
            data.insert(key.to_string(), previous.clone());
        }

        let (type_number, type_code) = event_type(envelope.kind, &envelope.body);
        data.insert(
            METADATA_KEY.to_string(),
            json!({
                "msg_id": message.id,
                "enqueued_at": timestamp(message.enqueued_at),
                "read_count": message.read_count,
                "processed_at": timestamp(processed_at),
                "type": type_number,
                "type_code": type_code,
            }),
        );

        LedgerRecord {
            definition_id: self.settings.event_definition_id,
            project_id: workspace_id,
            data: Value::Object(data),
            received_at: queued.received_at,
        }
    }

    /// Bookkeeping record for an event whose tenant has no workspace binding.
    /// Written under the meta workspace with the original event nested.
    pub fn new_tenant_notice(
        &self,
        tenant_external_id: &str,
        event: &Value,
        at: DateTime<Utc>,
    ) -> LedgerRecord {
        LedgerRecord {
            definition_id: self.settings.new_tenant_definition_id,
            project_id: self.settings.meta_workspace_id,
            data: json!({
                "event": event,
                METADATA_KEY: {
                    "timestamp": timestamp(at),
                    "event_type": NEW_TENANT_EVENT_TYPE,
                    "tenant_external_id": tenant_external_id,
                },
            }),
            received_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use common::domain::EventEnvelope;

    fn message(id: i64) -> QueueMessage {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 5).unwrap();
        QueueMessage {
            id,
            read_count: 1,
            enqueued_at: at,
            visible_at: at,
            payload: Value::Null,
        }
    }

    fn queued(envelope: EventEnvelope) -> QueuedEvent {
        QueuedEvent {
            tenant_external_id: Some("g1".to_string()),
            event: envelope,
            received_at: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
        }
    }

    fn processed_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 10).unwrap()
    }

    #[test]
    fn test_event_record_echoes_body_with_metadata() {
        let builder = LedgerRecordBuilder::default();
        let event = queued(EventEnvelope::new(
            EventKind::MessageCreate,
            json!({ "text": "hi", "type": 19 }),
        ));

        let record = builder.event_record(42, &message(7), &event, processed_at());

        assert_eq!(record.definition_id, 67);
        assert_eq!(record.project_id, 42);
        assert_eq!(record.received_at, event.received_at);
        assert_eq!(record.data["text"], "hi");
        assert_eq!(record.data["_metadata"]["msg_id"], 7);
        assert_eq!(record.data["_metadata"]["read_count"], 1);
        assert_eq!(record.data["_metadata"]["type"], 19);
        assert_eq!(record.data["_metadata"]["type_code"], "REPLY");
        assert_eq!(
            record.data["_metadata"]["enqueued_at"],
            "2024-01-01T00:00:05.000Z"
        );
        assert_eq!(
            record.data["_metadata"]["processed_at"],
            "2024-01-01T00:00:10.000Z"
        );
    }

    #[test]
    fn test_message_without_type_is_unknown() {
        let builder = LedgerRecordBuilder::default();
        let event = queued(EventEnvelope::new(EventKind::MessageCreate, json!({})));

        let record = builder.event_record(42, &message(1), &event, processed_at());

        assert!(record.data["_metadata"]["type"].is_null());
        assert_eq!(record.data["_metadata"]["type_code"], "UNKNOWN");
    }

    #[test]
    fn test_non_message_kind_uses_table_entry_and_previous_snapshot() {
        let builder = LedgerRecordBuilder::default();
        let event = queued(
            EventEnvelope::new(EventKind::RoleUpdate, json!({ "name": "mods" }))
                .with_previous(json!({ "name": "moderators" })),
        );

        let record = builder.event_record(42, &message(1), &event, processed_at());

        let descriptor = EventKind::RoleUpdate.descriptor();
        assert_eq!(
            record.data["_metadata"]["type"],
            descriptor.type_number.unwrap()
        );
        assert_eq!(record.data["_metadata"]["type_code"], "ROLE_UPDATE");
        assert_eq!(record.data["old_role"]["name"], "moderators");
        assert_eq!(record.data["name"], "mods");
    }

    #[test]
    fn test_previous_snapshot_ignored_for_kinds_without_key() {
        let builder = LedgerRecordBuilder::default();
        let event = queued(
            EventEnvelope::new(EventKind::ChannelCreate, json!({ "id": "1" }))
                .with_previous(json!({ "id": "0" })),
        );

        let record = builder.event_record(42, &message(1), &event, processed_at());

        let keys: Vec<&String> = record.data.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn test_scalar_body_is_wrapped() {
        let builder = LedgerRecordBuilder::default();
        let event = queued(EventEnvelope::new(EventKind::ReactionAdd, json!("👍")));

        let record = builder.event_record(42, &message(1), &event, processed_at());

        assert_eq!(record.data["payload"], "👍");
        assert!(record.data["_metadata"].is_object());
    }

    #[test]
    fn test_new_tenant_notice_targets_meta_workspace() {
        let builder = LedgerRecordBuilder::new(LedgerSettings {
            event_definition_id: 67,
            new_tenant_definition_id: 68,
            meta_workspace_id: 1,
        });
        let event = json!({ "kind": "message_create", "body": { "text": "hi" } });

        let record = builder.new_tenant_notice("unknown", &event, processed_at());

        assert_eq!(record.definition_id, 68);
        assert_eq!(record.project_id, 1);
        assert_eq!(record.received_at, None);
        assert_eq!(record.data["event"], event);
        assert_eq!(
            record.data["_metadata"]["event_type"],
            "new_tenant_identified"
        );
        assert_eq!(record.data["_metadata"]["tenant_external_id"], "unknown");
    }
}
