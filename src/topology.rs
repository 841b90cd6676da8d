//! Parsing of `CLUSTER SLOTS` replies.

use crate::connection::NodeAddr;
use crate::routing::SLOT_COUNT;
use crate::types::{ErrorKind, RedisError, RedisResult, Value};

/// One contiguous slot range owned by a primary.
///
/// Replicas reported by the server are discarded; the engine targets
/// primaries only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct SlotRange {
    pub(crate) start: u16,
    pub(crate) end: u16,
    pub(crate) primary: NodeAddr,
}

/// Parses the nested `CLUSTER SLOTS` reply into slot ranges.
///
/// Entries that do not have the expected shape are skipped rather than
/// failing the whole refresh, matching server-side leniency about
/// optional trailing fields.
pub(crate) fn parse_slots(reply: &Value) -> RedisResult<Vec<SlotRange>> {
    let items = match reply {
        Value::Bulk(items) => items,
        _ => fail!((
            ErrorKind::ResponseError,
            "Slot refresh error",
            "malformed CLUSTER SLOTS reply".to_string()
        )),
    };

    let mut ranges = Vec::with_capacity(items.len());
    for item in items {
        let parts = match item {
            Value::Bulk(parts) if parts.len() >= 3 => parts,
            _ => continue,
        };

        let start = match parts[0] {
            Value::Int(start) => start as u16,
            _ => continue,
        };
        let end = match parts[1] {
            Value::Int(end) => end as u16,
            _ => continue,
        };

        // third entry is the primary; replicas follow and are ignored
        let node = match &parts[2] {
            Value::Bulk(node) if node.len() >= 2 => node,
            _ => continue,
        };
        let host = match &node[0] {
            Value::Data(host) if !host.is_empty() => String::from_utf8_lossy(host).into_owned(),
            _ => continue,
        };
        let port = match node[1] {
            Value::Int(port) => port as u16,
            _ => continue,
        };

        ranges.push(SlotRange {
            start,
            end,
            primary: NodeAddr::new(host, port),
        });
    }

    Ok(ranges)
}

/// Validates that `ranges` cover all slots exactly once, sorting them by
/// start slot in the process.
pub(crate) fn validate_coverage(ranges: &mut [SlotRange]) -> RedisResult<()> {
    ranges.sort_by_key(|range| range.start);
    let last_slot = ranges.iter().try_fold(0u32, |prev_end, range| {
        if prev_end != u32::from(range.start) {
            return Err(RedisError::from((
                ErrorKind::ResponseError,
                "Slot refresh error",
                format!(
                    "received conflicting slot ranges at {} and {}..{}",
                    prev_end, range.start, range.end
                ),
            )));
        }
        Ok(u32::from(range.end) + 1)
    })?;

    if last_slot != u32::from(SLOT_COUNT) {
        fail!((
            ErrorKind::ResponseError,
            "Slot refresh error",
            format!("lacks the slots >= {last_slot}")
        ));
    }
    Ok(())
}
