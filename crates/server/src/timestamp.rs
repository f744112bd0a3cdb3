//! Persisted timestamp format.
//!
//! Expiry instants are stored as `YYYY-MM-DD HH:MM:SS` strings in UTC and read
//! back as UTC. Sub-second precision is dropped on write.

use crate::error::StoreError;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

const FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

pub fn format_utc(at: OffsetDateTime) -> Result<String, StoreError> {
    Ok(at.to_offset(UtcOffset::UTC).format(FORMAT)?)
}

pub fn parse_utc(value: &str) -> Result<OffsetDateTime, StoreError> {
    PrimitiveDateTime::parse(value, FORMAT)
        .map(PrimitiveDateTime::assume_utc)
        .map_err(|source| StoreError::Timestamp {
            value: value.to_string(),
            source,
        })
}
