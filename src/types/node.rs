use serde::{Deserialize, Serialize};

/// Node/ECU defined in the database.
#[derive(Default, Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Node {
    /// Node/ECU name.
    pub name: String,
    /// Associated comment. Empty when none was given.
    pub comment: String,
}

impl Node {
    pub fn new(name: &str, comment: &str) -> Self {
        Node {
            name: name.to_string(),
            comment: comment.to_string(),
        }
    }
}
