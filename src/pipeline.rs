use crate::cmd::{cmd, Cmd};

/// Represents a redis cluster command pipeline.
///
/// All commands of one pipeline are expected to hash to the same slot
/// (use hash tags to arrange this); a pipeline spanning slots is still
/// executed, but each redirected command costs an extra round trip.
#[derive(Clone, Default)]
pub struct ClusterPipeline {
    commands: Vec<Cmd>,
}

/// Shortcut for creating a new cluster pipeline.
pub fn cluster_pipe() -> ClusterPipeline {
    ClusterPipeline::new()
}

impl ClusterPipeline {
    /// Creates an empty pipeline.
    pub fn new() -> ClusterPipeline {
        ClusterPipeline::with_capacity(0)
    }

    /// Creates an empty pipeline with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> ClusterPipeline {
        ClusterPipeline {
            commands: Vec::with_capacity(capacity),
        }
    }

    /// Starts a new command. Arguments may be chained with
    /// [`arg`](ClusterPipeline::arg) afterwards.
    pub fn cmd(&mut self, name: &str) -> &mut ClusterPipeline {
        self.add_command(cmd(name))
    }

    /// Adds a complete command to the pipeline.
    pub fn add_command(&mut self, command: Cmd) -> &mut ClusterPipeline {
        self.commands.push(command);
        self
    }

    /// Appends an argument to the last started command.
    pub fn arg<T: AsRef<[u8]>>(&mut self, arg: T) -> &mut ClusterPipeline {
        if let Some(command) = self.commands.last_mut() {
            command.arg(arg);
        }
        self
    }

    pub(crate) fn commands(&self) -> &[Cmd] {
        &self.commands
    }

    /// Returns the number of commands in the pipeline.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns true if the pipeline holds no commands.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Clears out all commands.
    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builds_commands_in_order() {
        let mut pipe = cluster_pipe();
        pipe.cmd("SET")
            .arg("{t}.a")
            .arg("1")
            .cmd("GET")
            .arg("{t}.a");

        assert_eq!(pipe.len(), 2);
        let commands = pipe.commands();
        assert_eq!(commands[0].arg_idx(0), Some(&b"SET"[..]));
        assert_eq!(commands[0].arg_idx(2), Some(&b"1"[..]));
        assert_eq!(commands[1].arg_idx(0), Some(&b"GET"[..]));
        assert_eq!(commands[1].arg_idx(1), Some(&b"{t}.a"[..]));
    }

    #[test]
    fn test_clear() {
        let mut pipe = cluster_pipe();
        pipe.cmd("GET").arg("foo");
        assert!(!pipe.is_empty());
        pipe.clear();
        assert!(pipe.is_empty());
    }
}
