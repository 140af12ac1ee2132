use crate::types::{EventId, FieldValue, Timestamp};
use internment::Intern;
use serde::{Deserialize, Serialize};

/// A fully decoded event: header resolved, contexts and payload read
/// (spec.md §4.G).
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub name: Intern<String>,
    /// The stream's reconstructed 64-bit timestamp at the time this event was
    /// read, or `None` if the event header carried no timestamp field.
    pub timestamp: Option<Timestamp>,
    pub stream_context: Vec<(Intern<String>, FieldValue)>,
    pub context: Vec<(Intern<String>, FieldValue)>,
    pub payload: Vec<(Intern<String>, FieldValue)>,
}
