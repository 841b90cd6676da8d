use std::fmt;

/// Represents a redis command as an ordered sequence of byte-string
/// arguments.
///
/// The wire encoding is left to the transport; the engine only needs
/// structured access to the arguments for routing.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Cmd {
    args: Vec<Vec<u8>>,
}

/// Shortcut function for creating a new command.
pub fn cmd(name: &str) -> Cmd {
    let mut rv = Cmd::new();
    rv.arg(name);
    rv
}

impl Cmd {
    /// Creates a new empty command.
    pub fn new() -> Cmd {
        Cmd { args: vec![] }
    }

    /// Appends an argument to the command.
    pub fn arg<T: AsRef<[u8]>>(&mut self, arg: T) -> &mut Cmd {
        self.args.push(arg.as_ref().to_vec());
        self
    }

    /// Returns a reference to the argument at `idx`.
    pub fn arg_idx(&self, idx: usize) -> Option<&[u8]> {
        self.args.get(idx).map(|arg| &arg[..])
    }

    /// Returns the ascii uppercase version of the first argument
    /// (i.e., the command name).
    pub fn name(&self) -> Option<Vec<u8>> {
        self.arg_idx(0).map(|arg| arg.to_ascii_uppercase())
    }

    /// Returns the index of the argument that matches `candidate`, if it
    /// exists. The comparison ignores ascii case.
    pub fn position(&self, candidate: &[u8]) -> Option<usize> {
        self.args.iter().position(|arg| arg.eq_ignore_ascii_case(candidate))
    }

    /// Returns the number of arguments, including the command name.
    pub fn len(&self) -> usize {
        self.args.len()
    }

    /// Returns true if the command has no arguments at all.
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Returns an iterator over the arguments.
    pub fn args_iter(&self) -> impl Iterator<Item = &[u8]> {
        self.args.iter().map(|arg| &arg[..])
    }
}

impl fmt::Debug for Cmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for arg in &self.args {
            list.entry(&String::from_utf8_lossy(arg));
        }
        list.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arg_building() {
        let mut command = cmd("SET");
        command.arg("foo").arg(b"bar");

        assert_eq!(command.len(), 3);
        assert_eq!(command.arg_idx(0), Some(&b"SET"[..]));
        assert_eq!(command.arg_idx(1), Some(&b"foo"[..]));
        assert_eq!(command.arg_idx(2), Some(&b"bar"[..]));
        assert_eq!(command.arg_idx(3), None);
    }

    #[test]
    fn test_name_is_uppercased() {
        let mut command = cmd("xReAd");
        command.arg("StReAmS").arg("foo").arg("0");
        assert_eq!(command.name(), Some(b"XREAD".to_vec()));
    }

    #[test]
    fn test_position_ignores_case() {
        let mut command = cmd("XREAD");
        command.arg("streams").arg("foo").arg("0");
        assert_eq!(command.position(b"STREAMS"), Some(1));
        assert_eq!(command.position(b"NOSUCH"), None);
    }
}
