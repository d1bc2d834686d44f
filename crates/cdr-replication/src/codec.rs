//! Wire format of replicated records: one JSON object per message.

use crate::error::ReplicationError;
use cdr_core::Cdr;

/// Encode every field, including the id when set.
pub fn encode_record(record: &Cdr) -> Result<Vec<u8>, ReplicationError> {
    serde_json::to_vec(record).map_err(ReplicationError::Encode)
}

pub fn decode_record(payload: &[u8]) -> Result<Cdr, serde_json::Error> {
    serde_json::from_slice(payload)
}
