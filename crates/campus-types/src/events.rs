use serde::{Deserialize, Deserializer, Serialize, de};

pub const INVALID_USER_ID: &str = "Invalid user ID";
pub const RECIPIENT_NOT_FOUND: &str = "Recipient does not exist";
pub const STORE_FAILURE: &str = "An error occurred while retrieving messages";

/// A direct message sent by a client over the realtime channel.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageCommand {
    /// Sent as a JSON number or a numeric string.
    #[serde(deserialize_with = "numeric_id")]
    pub sender_id: i64,
    /// Username or numeric user id, sent as a JSON string or number.
    #[serde(deserialize_with = "identifier_text")]
    pub receiver_identifier: String,
    pub message_content: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Identifier {
    Text(String),
    Integer(i64),
    Float(f64),
}

/// Integral floats such as `2.0` count as ids.
fn integral(value: f64) -> Option<i64> {
    (value.fract() == 0.0 && value.abs() < i64::MAX as f64).then_some(value as i64)
}

fn identifier_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Identifier::deserialize(deserializer)? {
        Identifier::Text(text) => Ok(text),
        Identifier::Integer(id) => Ok(id.to_string()),
        Identifier::Float(value) => integral(value)
            .map(|id| id.to_string())
            .ok_or_else(|| de::Error::custom(format!("identifier {} is not an integer", value))),
    }
}

fn numeric_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match Identifier::deserialize(deserializer)? {
        Identifier::Integer(id) => Ok(id),
        Identifier::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("user id '{}' is not an integer", text))),
        Identifier::Float(value) => integral(value)
            .ok_or_else(|| de::Error::custom(format!("user id {} is not an integer", value))),
    }
}

/// One entry of a user's history, annotated relative to that user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryMessage {
    pub message_id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub message_content: String,
    pub sender_name: String,
    pub receiver_name: String,
    /// Encoded as 0 or 1 on the wire.
    #[serde(with = "flag")]
    pub is_receiver: bool,
}

/// Frames pushed from the server to a realtime client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HubPayload {
    History { messages: Vec<HistoryMessage> },
    Error { error: String },
}

impl HubPayload {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    pub fn history(messages: Vec<HistoryMessage>) -> Self {
        Self::History { messages }
    }
}

mod flag {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Ok(u8::deserialize(deserializer)? != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn command_accepts_string_or_numeric_recipient() {
        let by_name: SendMessageCommand = serde_json::from_value(json!({
            "senderId": 1,
            "receiverIdentifier": "bob",
            "messageContent": "hi"
        }))
        .unwrap();
        assert_eq!(by_name.receiver_identifier, "bob");

        let by_id: SendMessageCommand = serde_json::from_value(json!({
            "senderId": 1,
            "receiverIdentifier": 2,
            "messageContent": "hi"
        }))
        .unwrap();
        assert_eq!(by_id.receiver_identifier, "2");
    }

    #[test]
    fn command_accepts_sender_id_as_numeric_string() {
        let command: SendMessageCommand = serde_json::from_value(json!({
            "senderId": "1",
            "receiverIdentifier": "bob",
            "messageContent": "hi"
        }))
        .unwrap();
        assert_eq!(command.sender_id, 1);

        let result = serde_json::from_value::<SendMessageCommand>(json!({
            "senderId": "alice",
            "receiverIdentifier": "bob",
            "messageContent": "hi"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn integral_float_ids_are_accepted() {
        let command: SendMessageCommand = serde_json::from_value(json!({
            "senderId": 1.0,
            "receiverIdentifier": 2.0,
            "messageContent": "hi"
        }))
        .unwrap();
        assert_eq!(command.sender_id, 1);
        assert_eq!(command.receiver_identifier, "2");

        let result = serde_json::from_value::<SendMessageCommand>(json!({
            "senderId": 1,
            "receiverIdentifier": 2.5,
            "messageContent": "hi"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn command_rejects_missing_fields() {
        let result = serde_json::from_str::<SendMessageCommand>(r#"{"senderId": 1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn payload_wire_shape() {
        let history = HubPayload::history(vec![HistoryMessage {
            message_id: 7,
            sender_id: 1,
            receiver_id: 2,
            message_content: "hi".into(),
            sender_name: "alice".into(),
            receiver_name: "bob".into(),
            is_receiver: true,
        }]);
        let value = serde_json::to_value(&history).unwrap();
        assert_eq!(value["messages"][0]["isReceiver"], json!(1));
        assert_eq!(value["messages"][0]["senderName"], json!("alice"));

        let error = serde_json::to_value(HubPayload::error(RECIPIENT_NOT_FOUND)).unwrap();
        assert_eq!(error, json!({ "error": "Recipient does not exist" }));
    }
}
