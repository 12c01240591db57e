use std::{
    collections::HashMap,
    fmt,
    sync::{PoisonError, RwLock},
};

use anyhow::Result;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Slot {
    RemoteDescription,
    LocalDescription,
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RemoteDescription => "remoteSessionDescription",
            Self::LocalDescription => "localSessionDescription",
        })
    }
}

/// The operator-facing text fields.
pub trait TextStore: Send + Sync {
    fn get(&self, slot: Slot) -> Option<String>;
    fn set(&self, slot: Slot, value: String);
}

#[derive(Debug, Default)]
pub struct MemoryTextStore {
    slots: RwLock<HashMap<Slot, String>>,
}

impl MemoryTextStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TextStore for MemoryTextStore {
    fn get(&self, slot: Slot) -> Option<String> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&slot)
            .cloned()
    }

    fn set(&self, slot: Slot, value: String) {
        self.slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(slot, value);
    }
}

pub trait Clipboard: Send + Sync {
    fn copy(&self, text: &str) -> Result<()>;
}
