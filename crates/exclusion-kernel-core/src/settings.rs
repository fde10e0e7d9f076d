use serde::{Deserialize, Serialize};

use crate::store::DEFAULT_ASSET_NAME;

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct ExclusionSettings {
    /// Asset requested from the content provider.
    pub asset_name: String,
}

impl Default for ExclusionSettings {
    fn default() -> Self {
        Self { asset_name: DEFAULT_ASSET_NAME.to_string() }
    }
}
