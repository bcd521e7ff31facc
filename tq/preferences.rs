use crate::error::App;
use crate::scores::SortBy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

pub const PREFERENCES_FILE: &str = "preferences.toml";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Preferences {
    pub sort_by: SortBy,
}

impl Preferences {
    pub async fn load(path: &Path) -> Result<Self, App> {
        if !path.exists() {
            return Ok(Preferences::default());
        }
        let content = fs::read_to_string(path).await?;
        Ok(toml::from_str(&content)?)
    }

    pub async fn save(&self, path: &Path) -> Result<(), App> {
        fs::write(path, toml::to_string(self)?).await?;
        Ok(())
    }
}
