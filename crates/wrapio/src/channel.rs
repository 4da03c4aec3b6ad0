//! The two output roles a legacy routine writes to.

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    /// Primary output (`stdout`).
    Output,
    /// Error output (`stderr`).
    Error,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Output, Channel::Error];

    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Output => "stdout",
            Channel::Error => "stderr",
        }
    }

    /// Stream number used by the C shims: 1 for output, 2 for error.
    pub fn fd(self) -> i32 {
        match self {
            Channel::Output => 1,
            Channel::Error => 2,
        }
    }

    pub fn from_fd(fd: i32) -> Option<Self> {
        match fd {
            1 => Some(Channel::Output),
            2 => Some(Channel::Error),
            _ => None,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Channel::Output => 0,
            Channel::Error => 1,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fd_round_trips_for_both_channels() {
        for &c in &Channel::ALL {
            assert_eq!(Channel::from_fd(c.fd()), Some(c));
        }
        assert_eq!(Channel::from_fd(0), None);
        assert_eq!(Channel::from_fd(3), None);
    }

    #[test]
    fn indices_are_distinct() {
        assert_ne!(Channel::Output.index(), Channel::Error.index());
    }
}
