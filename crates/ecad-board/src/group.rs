use ecad_core::Kiid;
use serde::{Deserialize, Serialize};

/// A named grouping of board items, referencing members by UUID.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BoardGroup {
    pub id: Kiid,
    pub name: String,
    pub members: Vec<Kiid>,
    pub locked: bool,
}

impl BoardGroup {
    pub fn new(name: impl Into<String>) -> Self {
        BoardGroup { id: Kiid::new(), name: name.into(), members: Vec::new(), locked: false }
    }
}
