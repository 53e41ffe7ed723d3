use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use super::file::SourceFile;
use crate::error::PdfSignError;

/// Opaque queue key, allocated from a monotonically increasing counter.
///
/// Ordering follows allocation order, so the smallest present key is the
/// earliest queued document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueKey(u64);

impl QueueKey {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl Display for QueueKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QueueKey {
    type Err = PdfSignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(QueueKey)
            .map_err(|_| PdfSignError::InvalidInput(format!("Invalid queue key: {}", s)))
    }
}

/// One queued document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub key: QueueKey,
    pub file: SourceFile,
}

/// Who decides where the visual signature goes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlacementMode {
    /// The signing server picks the position.
    #[default]
    Auto,
    /// The user positioned the signature; placement data must be present.
    Manual,
}

impl Display for PlacementMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            PlacementMode::Auto => write!(f, "auto"),
            PlacementMode::Manual => write!(f, "manual"),
        }
    }
}

impl FromStr for PlacementMode {
    type Err = PdfSignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(PlacementMode::Auto),
            "manual" => Ok(PlacementMode::Manual),
            _ => Err(PdfSignError::InvalidInput(format!(
                "Invalid placement mode: {}",
                s
            ))),
        }
    }
}
