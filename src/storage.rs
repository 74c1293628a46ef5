//! Local storage collaborator
//!
//! The coordinator only uses the whole-document `get_state` / `set_state`
//! pair. The per-field `read` / `write` pair serves UI collaborators such as
//! the color and theme pickers.

use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::models::{normalize_color, Shape, SharedState, Theme};

/// Field of [`SharedState`] addressable through [`Storage::read`] and
/// [`Storage::write`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKey {
    Shapes,
    SelectedColor,
    SelectedTheme,
    StrokeStyle,
}

impl StoreKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKey::Shapes => "shapes",
            StoreKey::SelectedColor => "selectedColor",
            StoreKey::SelectedTheme => "selectedTheme",
            StoreKey::StrokeStyle => "strokeStyle",
        }
    }
}

impl std::fmt::Display for StoreKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StoreKey {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shapes" => Ok(StoreKey::Shapes),
            "selectedColor" => Ok(StoreKey::SelectedColor),
            "selectedTheme" => Ok(StoreKey::SelectedTheme),
            "strokeStyle" => Ok(StoreKey::StrokeStyle),
            _ => Err(format!("Unknown store key: {}", s)),
        }
    }
}

pub trait Storage: Send + Sync {
    fn get_state(&self) -> SharedState;

    fn set_state(&self, state: SharedState);

    fn read(&self, key: StoreKey) -> Value {
        let state = self.get_state();
        let value = match key {
            StoreKey::Shapes => serde_json::to_value(&state.shapes),
            StoreKey::SelectedColor => Ok(Value::String(state.selected_color)),
            StoreKey::SelectedTheme => serde_json::to_value(state.selected_theme),
            StoreKey::StrokeStyle => Ok(Value::String(state.stroke_style)),
        };
        value.unwrap_or(Value::Null)
    }

    /// Edit the state in place. Implementations shared between threads must
    /// apply `edit` atomically with respect to `set_state`.
    fn update(&self, edit: &mut dyn FnMut(&mut SharedState)) {
        let mut state = self.get_state();
        edit(&mut state);
        self.set_state(state);
    }

    /// Replace one field; the value must deserialize into the field's type
    fn write(&self, key: StoreKey, value: Value) -> AppResult<()> {
        match key {
            StoreKey::Shapes => {
                let mut shapes = decode_field::<Vec<Shape>>(key, value)?;
                self.update(&mut |state| state.shapes = std::mem::take(&mut shapes));
            }
            StoreKey::SelectedColor => {
                let mut color = normalize_color(&decode_field::<String>(key, value)?);
                self.update(&mut |state| state.selected_color = std::mem::take(&mut color));
            }
            StoreKey::SelectedTheme => {
                let theme = decode_field::<Theme>(key, value)?;
                self.update(&mut |state| state.selected_theme = theme);
            }
            StoreKey::StrokeStyle => {
                let mut style = decode_field::<String>(key, value)?;
                self.update(&mut |state| state.stroke_style = std::mem::take(&mut style));
            }
        }
        Ok(())
    }
}

fn decode_field<T: serde::de::DeserializeOwned>(key: StoreKey, value: Value) -> AppResult<T> {
    serde_json::from_value(value).map_err(|e| AppError::invalid_value(key.as_str(), &e.to_string()))
}

/// Storage kept in memory, shareable between the coordinator and the UI
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    state: Arc<RwLock<SharedState>>,
}

impl MemoryStorage {
    pub fn new(initial: SharedState) -> Self {
        Self {
            state: Arc::new(RwLock::new(initial)),
        }
    }
}

impl Storage for MemoryStorage {
    fn get_state(&self) -> SharedState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_state(&self, state: SharedState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn update(&self, edit: &mut dyn FnMut(&mut SharedState)) {
        edit(&mut self.state.write().unwrap_or_else(PoisonError::into_inner));
    }
}
