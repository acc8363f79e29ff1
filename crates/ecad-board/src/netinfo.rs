use serde::{Deserialize, Serialize};

/// Net code: index of a net within its board. Zero is the "no net" net.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NetCode(pub i32);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetInfo {
    pub code: NetCode,
    pub name: String,
    /// Name of the net class this net belongs to, if any.
    pub netclass: Option<String>,
}

/// Routing rules shared by a group of nets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetClass {
    pub name: String,
    pub track_width: i32,
    pub clearance: i32,
}

impl NetClass {
    pub fn new(name: impl Into<String>) -> Self {
        NetClass { name: name.into(), track_width: 0, clearance: 0 }
    }
}
