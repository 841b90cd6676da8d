//! Routing-key extraction and slot computation.

use crate::cmd::Cmd;

pub(crate) const SLOT_COUNT: u16 = 16384;

/// Returns the routing key of a command, if it has one.
///
/// For most commands this is the first argument. A few commands keep
/// their first key elsewhere: `EVAL`/`EVALSHA` take the first key after
/// the numkeys argument, `XGROUP`/`XINFO` after the subcommand, and
/// `XREAD`/`XREADGROUP` after the `STREAMS` keyword. Commands without a
/// key (server-info style) return `None`.
pub(crate) fn routing_key(command: &Cmd) -> Option<&[u8]> {
    let name = command.name()?;
    match &name[..] {
        b"EVAL" | b"EVALSHA" => {
            let key_count: u64 = std::str::from_utf8(command.arg_idx(2)?)
                .ok()?
                .parse()
                .ok()?;
            if key_count == 0 {
                None
            } else {
                command.arg_idx(3)
            }
        }
        b"XGROUP" | b"XINFO" => command.arg_idx(2),
        b"XREAD" | b"XREADGROUP" => {
            let streams_position = command.position(b"STREAMS")?;
            command.arg_idx(streams_position + 1)
        }
        _ => command.arg_idx(1),
    }
}

/// Returns the slot that matches `key`, applying the hash tag convention.
pub fn get_slot(key: &[u8]) -> u16 {
    let key = match get_hashtag(key) {
        Some(tag) => tag,
        None => key,
    };
    slot(key)
}

fn slot(key: &[u8]) -> u16 {
    crc16::State::<crc16::XMODEM>::calculate(key) % SLOT_COUNT
}

/// Returns the slot a single command routes to, or `None` when no
/// routable key can be derived.
pub(crate) fn slot_for_command(command: &Cmd) -> Option<u16> {
    routing_key(command).map(get_slot)
}

/// Returns the slot a pipeline routes to. The first command decides; the
/// remaining commands are expected to agree (see [`is_same_slot`]).
pub(crate) fn slot_for_pipeline(commands: &[Cmd]) -> Option<u16> {
    commands.first().and_then(slot_for_command)
}

/// Returns true iff every command in the pipeline hashes to one slot.
/// Used as a sanity check only; it does not block execution.
pub(crate) fn is_same_slot(commands: &[Cmd]) -> bool {
    let mut slots = commands.iter().map(slot_for_command);
    match slots.next() {
        Some(Some(first)) => slots.all(|slot| slot == Some(first)),
        _ => false,
    }
}

fn get_hashtag(key: &[u8]) -> Option<&[u8]> {
    let open = key.iter().position(|v| *v == b'{')?;

    let close = key[open..].iter().position(|v| *v == b'}')?;

    let rv = &key[open + 1..open + close];
    if rv.is_empty() {
        None
    } else {
        Some(rv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::cmd;

    #[test]
    fn test_get_hashtag() {
        assert_eq!(get_hashtag(&b"foo{bar}baz"[..]), Some(&b"bar"[..]));
        assert_eq!(get_hashtag(&b"foo{}{baz}"[..]), None);
        assert_eq!(get_hashtag(&b"foo{{bar}}zap"[..]), Some(&b"{bar"[..]));
        assert_eq!(get_hashtag(&b"no-tag"[..]), None);
        assert_eq!(get_hashtag(&b"unclosed{tag"[..]), None);
    }

    #[test]
    fn test_known_slots() {
        // well-known values from the cluster key distribution
        assert_eq!(get_slot(b"foo"), 12182);
        assert_eq!(get_slot(b"hello"), 866);
        // CRC16-XMODEM check value: 0x31C3
        assert_eq!(get_slot(b"123456789"), 12739);
    }

    #[test]
    fn test_hashtag_forces_same_slot() {
        assert_eq!(
            get_slot(b"{user1000}.following"),
            get_slot(b"{user1000}.followers")
        );
        assert_eq!(get_slot(b"{t}.a"), get_slot(b"{t}.b"));
        assert_eq!(get_slot(b"foo{bar}baz"), get_slot(b"bar"));
    }

    #[test]
    fn test_routing_key_default_is_first_argument() {
        let mut command = cmd("SET");
        command.arg("foo").arg("bar");
        assert_eq!(routing_key(&command), Some(&b"foo"[..]));

        let mut command = cmd("get");
        command.arg("foo");
        assert_eq!(routing_key(&command), Some(&b"foo"[..]));
    }

    #[test]
    fn test_routing_key_keyless_commands() {
        assert_eq!(routing_key(&cmd("PING")), None);
        assert_eq!(routing_key(&cmd("INFO")), None);
    }

    #[test]
    fn test_routing_key_eval() {
        let mut command = cmd("EVAL");
        command.arg("return 1").arg("1").arg("foo").arg("bar");
        assert_eq!(routing_key(&command), Some(&b"foo"[..]));

        let mut zero_keys = cmd("EVAL");
        zero_keys.arg("return 1").arg("0");
        assert_eq!(routing_key(&zero_keys), None);
    }

    #[test]
    fn test_routing_key_xread() {
        let mut command = cmd("XREAD");
        command.arg("COUNT").arg("2").arg("STREAMS").arg("stream").arg("0");
        assert_eq!(routing_key(&command), Some(&b"stream"[..]));

        let mut grouped = cmd("xreadgroup");
        grouped
            .arg("GROUP")
            .arg("g")
            .arg("c")
            .arg("streams")
            .arg("stream")
            .arg(">");
        assert_eq!(routing_key(&grouped), Some(&b"stream"[..]));
    }

    #[test]
    fn test_is_same_slot() {
        let mut a = cmd("GET");
        a.arg("{t}.a");
        let mut b = cmd("GET");
        b.arg("{t}.b");
        assert!(is_same_slot(&[a.clone(), b]));

        let mut other = cmd("GET");
        other.arg("different");
        assert!(!is_same_slot(&[a.clone(), other]));

        // keyless commands never agree on a slot
        assert!(!is_same_slot(&[a, cmd("PING")]));
        assert!(!is_same_slot(&[]));
    }
}
