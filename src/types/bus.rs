use serde::{Deserialize, Serialize};

/// CAN bus defined in the database.
#[derive(Default, Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Bus {
    /// Bus name.
    pub name: String,
    /// Associated comment. Empty when none was given.
    pub comment: String,
    /// Baudrate in bit/s. `0` if not specified.
    pub baudrate: u32,
}

impl Bus {
    pub fn new(name: &str, comment: &str) -> Self {
        Bus {
            name: name.to_string(),
            comment: comment.to_string(),
            baudrate: 0,
        }
    }
}
