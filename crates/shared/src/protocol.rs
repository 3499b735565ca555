use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::domain::Tally;

/// Channel the SMS gateway publishes inbound messages on.
pub const VOTE_CHANNEL: &str = "sms-notifications";
/// Channel carrying tally snapshots for late-joiner catch-up.
pub const STATUS_CHANNEL: &str = "sms-notifications-votes";
/// Event name of tally snapshots on the status channel.
pub const VOTE_SUMMARY: &str = "voteSummary";
/// Event name used when publishing inbound SMS messages.
pub const SMS_EVENT: &str = "smsEvent";

/// Name plus JSON payload, the unit every channel carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub name: String,
    pub data: Value,
}

impl Envelope {
    pub fn new<T: Serialize>(name: impl Into<String>, data: &T) -> serde_json::Result<Self> {
        Ok(Self {
            name: name.into(),
            data: serde_json::to_value(data)?,
        })
    }

    pub fn decode<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_value(self.data.clone())
    }
}

/// Inbound SMS as the gateway delivers it on the vote channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmsPayload {
    pub from: String,
    /// Epoch milliseconds assigned by the gateway.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Wraps a tally as the status-channel snapshot late joiners rewind to.
pub fn vote_summary(tally: &Tally) -> serde_json::Result<Envelope> {
    Envelope::new(VOTE_SUMMARY, tally)
}

/// Reads a status-channel envelope back into a tally, if it is a vote
/// summary with a well-formed payload.
pub fn decode_vote_summary(envelope: &Envelope) -> Option<Tally> {
    if envelope.name != VOTE_SUMMARY {
        return None;
    }
    envelope.decode().ok()
}
