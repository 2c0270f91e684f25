use anyhow::{Context, Result};
use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

use crate::calendar::GridMetrics;

/// Authentication is stubbed to a single local user.
pub const DEFAULT_USER_ID: &str = "default-user";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum WeekStart {
    Sunday,
    Monday,
}

impl WeekStart {
    pub fn weekday(self) -> Weekday {
        match self {
            WeekStart::Sunday => Weekday::Sun,
            WeekStart::Monday => Weekday::Mon,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GcalSettings {
    pub calendar_id: String,
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserSettings {
    user_id: String,
    week_starts_on: WeekStart,
    grid: GridMetrics,
    gcal: Option<GcalSettings>,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            user_id: DEFAULT_USER_ID.to_string(),
            week_starts_on: WeekStart::Monday,
            grid: GridMetrics::default(),
            gcal: None,
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn user_id(&self) -> String {
        self.data.read().unwrap().user_id.clone()
    }

    pub fn week_starts_on(&self) -> WeekStart {
        self.data.read().unwrap().week_starts_on
    }

    pub fn grid_metrics(&self) -> GridMetrics {
        self.data.read().unwrap().grid
    }

    pub fn gcal(&self) -> Option<GcalSettings> {
        self.data.read().unwrap().gcal.clone()
    }

    pub fn update_week_start(&self, week_starts_on: WeekStart) -> Result<()> {
        let mut guard = self.data.write().unwrap();
        guard.week_starts_on = week_starts_on;
        self.persist(&guard)
    }

    pub fn update_gcal(&self, gcal: Option<GcalSettings>) -> Result<()> {
        let mut guard = self.data.write().unwrap();
        guard.gcal = gcal;
        self.persist(&guard)
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
