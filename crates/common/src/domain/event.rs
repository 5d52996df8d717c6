use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Closed set of inbound event kinds accepted by the ingestion pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    #[default]
    MessageCreate,
    ReactionAdd,
    ReactionRemove,
    MessageDelete,
    MessageUpdate,
    ChannelCreate,
    ChannelDelete,
    ThreadCreate,
    ThreadDelete,
    MemberJoin,
    MemberLeave,
    MemberUpdate,
    RoleCreate,
    RoleDelete,
    RoleUpdate,
    VoiceStateUpdate,
    EmojiCreate,
    EmojiDelete,
    EmojiUpdate,
    StickerCreate,
    StickerDelete,
    StickerUpdate,
}

/// Static facts about an event kind used when building ledger metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventKindDescriptor {
    /// Numeric subtype recorded in `_metadata.type`. `None` for message
    /// creation, whose subtype comes from the message body.
    pub type_number: Option<u32>,
    pub type_code: &'static str,
    /// Key under which the previous snapshot of the entity is embedded
    pub previous_key: Option<&'static str>,
}

impl EventKind {
    pub const ALL: [EventKind; 22] = [
        EventKind::MessageCreate,
        EventKind::ReactionAdd,
        EventKind::ReactionRemove,
        EventKind::MessageDelete,
        EventKind::MessageUpdate,
        EventKind::ChannelCreate,
        EventKind::ChannelDelete,
        EventKind::ThreadCreate,
        EventKind::ThreadDelete,
        EventKind::MemberJoin,
        EventKind::MemberLeave,
        EventKind::MemberUpdate,
        EventKind::RoleCreate,
        EventKind::RoleDelete,
        EventKind::RoleUpdate,
        EventKind::VoiceStateUpdate,
        EventKind::EmojiCreate,
        EventKind::EmojiDelete,
        EventKind::EmojiUpdate,
        EventKind::StickerCreate,
        EventKind::StickerDelete,
        EventKind::StickerUpdate,
    ];

    pub fn descriptor(self) -> EventKindDescriptor {
        let (type_number, type_code, previous_key) = match self {
            EventKind::MessageCreate => (None, "MESSAGE_CREATE", None),
            EventKind::ReactionAdd => (Some(1000), "REACTION_ADD", None),
            EventKind::ReactionRemove => (Some(1001), "REACTION_REMOVE", None),
            EventKind::MessageDelete => (Some(1002), "MESSAGE_DELETE", Some("old_message")),
            EventKind::MessageUpdate => (Some(1003), "MESSAGE_UPDATE", Some("old_message")),
            EventKind::ChannelCreate => (Some(1004), "CHANNEL_CREATE", None),
            EventKind::ChannelDelete => (Some(1005), "CHANNEL_DELETE", None),
            EventKind::ThreadCreate => (Some(1006), "THREAD_CREATE", None),
            EventKind::ThreadDelete => (Some(1007), "THREAD_DELETE", None),
            EventKind::MemberJoin => (Some(1008), "MEMBER_JOIN", None),
            EventKind::MemberLeave => (Some(1009), "MEMBER_LEAVE", None),
            EventKind::MemberUpdate => (Some(1010), "MEMBER_UPDATE", Some("old_member")),
            EventKind::RoleCreate => (Some(1011), "ROLE_CREATE", None),
            EventKind::RoleDelete => (Some(1012), "ROLE_DELETE", None),
            EventKind::RoleUpdate => (Some(1013), "ROLE_UPDATE", Some("old_role")),
            EventKind::VoiceStateUpdate => (Some(1014), "VOICE_STATE_UPDATE", None),
            EventKind::EmojiCreate => (Some(1015), "EMOJI_CREATE", None),
            EventKind::EmojiDelete => (Some(1016), "EMOJI_DELETE", None),
            EventKind::EmojiUpdate => (Some(1017), "EMOJI_UPDATE", Some("old_emoji")),
            EventKind::StickerCreate => (Some(1018), "STICKER_CREATE", None),
            EventKind::StickerDelete => (Some(1019), "STICKER_DELETE", None),
            EventKind::StickerUpdate => (Some(1020), "STICKER_UPDATE", Some("old_sticker")),
        };

        EventKindDescriptor {
            type_number,
            type_code,
            previous_key,
        }
    }

    /// Lower snake case name, as used on the wire
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::MessageCreate => "message_create",
            EventKind::ReactionAdd => "reaction_add",
            EventKind::ReactionRemove => "reaction_remove",
            EventKind::MessageDelete => "message_delete",
            EventKind::MessageUpdate => "message_update",
            EventKind::ChannelCreate => "channel_create",
            EventKind::ChannelDelete => "channel_delete",
            EventKind::ThreadCreate => "thread_create",
            EventKind::ThreadDelete => "thread_delete",
            EventKind::MemberJoin => "member_join",
            EventKind::MemberLeave => "member_leave",
            EventKind::MemberUpdate => "member_update",
            EventKind::RoleCreate => "role_create",
            EventKind::RoleDelete => "role_delete",
            EventKind::RoleUpdate => "role_update",
            EventKind::VoiceStateUpdate => "voice_state_update",
            EventKind::EmojiCreate => "emoji_create",
            EventKind::EmojiDelete => "emoji_delete",
            EventKind::EmojiUpdate => "emoji_update",
            EventKind::StickerCreate => "sticker_create",
            EventKind::StickerDelete => "sticker_delete",
            EventKind::StickerUpdate => "sticker_update",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps the chat platform's numeric message type to its code.
pub fn message_type_code(message_type: u64) -> &'static str {
    match message_type {
        0 => "DEFAULT",
        1 => "RECIPIENT_ADD",
        2 => "RECIPIENT_REMOVE",
        3 => "CALL",
        4 => "CHANNEL_NAME_CHANGE",
        5 => "CHANNEL_ICON_CHANGE",
        6 => "CHANNEL_PINNED_MESSAGE",
        7 => "GUILD_MEMBER_JOIN",
        8 => "USER_PREMIUM_GUILD_SUBSCRIPTION",
        9 => "USER_PREMIUM_GUILD_SUBSCRIPTION_TIER_1",
        10 => "USER_PREMIUM_GUILD_SUBSCRIPTION_TIER_2",
        11 => "USER_PREMIUM_GUILD_SUBSCRIPTION_TIER_3",
        12 => "CHANNEL_FOLLOW_ADD",
        14 => "GUILD_DISCOVERY_DISQUALIFIED",
        15 => "GUILD_DISCOVERY_REQUALIFIED",
        16 => "GUILD_DISCOVERY_GRACE_PERIOD_INITIAL_WARNING",
        17 => "GUILD_DISCOVERY_GRACE_PERIOD_FINAL_WARNING",
        18 => "THREAD_CREATED",
        19 => "REPLY",
        20 => "CHAT_INPUT_COMMAND",
        21 => "THREAD_STARTER_MESSAGE",
        22 => "GUILD_INVITE_REMINDER",
        23 => "CONTEXT_MENU_COMMAND",
        24 => "AUTO_MODERATION_ACTION",
        25 => "ROLE_SUBSCRIPTION_PURCHASE",
        26 => "INTERACTION_PREMIUM_UPSELL",
        27 => "STAGE_START",
        28 => "STAGE_END",
        29 => "STAGE_SPEAKER",
        30 => "STAGE_TOPIC",
        31 => "GUILD_APPLICATION_PREMIUM_SUBSCRIPTION",
        _ => "UNKNOWN",
    }
}

/// A single inbound event, tagged with its kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    #[serde(default)]
    pub kind: EventKind,
    pub body: Value,
    /// Snapshot of the entity before an update or delete, when the source supplied one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<Value>,
}

impl EventEnvelope {
    pub fn new(kind: EventKind, body: Value) -> Self {
        Self {
            kind,
            body,
            previous: None,
        }
    }

    pub fn with_previous(mut self, previous: Value) -> Self {
        self.previous = Some(previous);
        self
    }
}

/// Payload stored in the durable queue for every inbound event.
///
/// The tenant identifier is carried as text so that identifiers beyond the
/// 53-bit safe integer range survive the queue boundary unchanged. Numeric
/// identifiers written by older producers are accepted and converted to text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedEvent {
    #[serde(default, deserialize_with = "deserialize_external_id")]
    pub tenant_external_id: Option<String>,
    pub event: EventEnvelope,
    #[serde(default)]
    pub received_at: Option<DateTime<Utc>>,
}

impl QueuedEvent {
    /// Tenant identifier, or `None` when absent or blank
    pub fn tenant(&self) -> Option<&str> {
        self.tenant_external_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

fn deserialize_external_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(id)) => Ok(Some(id)),
        Some(Value::Number(id)) => Ok(Some(id.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "tenant id must be a string or integer, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn test_kind_wire_names_match_as_str() {
        for kind in EventKind::ALL {
            let encoded = serde_json::to_value(kind).unwrap();
            assert_eq!(encoded, json!(kind.as_str()));
        }
    }

    #[test]
    fn test_kind_type_numbers_are_unique_and_contiguous() {
        let numbers: Vec<u32> = EventKind::ALL
            .iter()
            .filter_map(|kind| kind.descriptor().type_number)
            .collect();

        assert_eq!(numbers.len(), 21);
        assert_eq!(numbers.iter().collect::<HashSet<_>>().len(), 21);
        assert_eq!(*numbers.iter().min().unwrap(), 1000);
        assert_eq!(*numbers.iter().max().unwrap(), 1020);
    }

    #[test]
    fn test_update_kinds_carry_previous_key() {
        assert_eq!(
            EventKind::MessageUpdate.descriptor().previous_key,
            Some("old_message")
        );
        assert_eq!(
            EventKind::MemberUpdate.descriptor().previous_key,
            Some("old_member")
        );
        assert_eq!(EventKind::ChannelCreate.descriptor().previous_key, None);
    }

    #[test]
    fn test_message_type_code_lookup() {
        assert_eq!(message_type_code(0), "DEFAULT");
        assert_eq!(message_type_code(19), "REPLY");
        assert_eq!(message_type_code(13), "UNKNOWN");
        assert_eq!(message_type_code(9999), "UNKNOWN");
    }

    #[test]
    fn test_queued_event_defaults_kind_to_message_create() {
        let event: QueuedEvent = serde_json::from_value(json!({
            "tenant_external_id": "g1",
            "event": { "body": { "text": "hi" } },
            "received_at": "2024-01-01T00:00:00Z"
        }))
        .unwrap();

        assert_eq!(event.event.kind, EventKind::MessageCreate);
        assert_eq!(event.tenant(), Some("g1"));
        assert_eq!(event.event.body, json!({ "text": "hi" }));
        assert!(event.received_at.is_some());
    }

    #[test]
    fn test_large_numeric_tenant_id_keeps_every_digit() {
        let raw = r#"{"tenant_external_id": 1234567890123456789012,
            "event": {"kind": "reaction_add", "body": {}}}"#;
        let event: QueuedEvent = serde_json::from_str(raw).unwrap();

        assert_eq!(
            event.tenant_external_id.as_deref(),
            Some("1234567890123456789012")
        );
        assert_eq!(event.event.kind, EventKind::ReactionAdd);
        assert!(event.received_at.is_none());
    }

    #[test]
    fn test_blank_tenant_is_treated_as_absent() {
        let event: QueuedEvent = serde_json::from_value(json!({
            "tenant_external_id": "  ",
            "event": { "body": {} }
        }))
        .unwrap();

        assert_eq!(event.tenant(), None);
    }

    #[test]
    fn test_object_tenant_id_is_rejected() {
        let result = serde_json::from_value::<QueuedEvent>(json!({
            "tenant_external_id": { "id": 1 },
            "event": { "body": {} }
        }));

        assert!(result.is_err());
    }
}
