use serde::{Deserialize, Serialize};

/// One candidate from a church location search. Never persisted; handed
/// straight back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationCandidate {
    pub name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
}
