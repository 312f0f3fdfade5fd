use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use supafleet_utils::INSTANCE_PREFIX;

use crate::{SupafleetError, SupafleetResult};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The highest instance id the port allocator supports.
pub const MAX_INSTANCE_ID: u32 = 4000;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A validated instance identifier in `1..=MAX_INSTANCE_ID`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct InstanceId(u32);

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl InstanceId {
    /// Validates a raw id.
    pub fn new(raw: i64) -> SupafleetResult<Self> {
        if raw <= 0 {
            return Err(SupafleetError::InvalidArgument(format!(
                "instance id must be a positive integer, got {}",
                raw
            )));
        }

        if raw > MAX_INSTANCE_ID as i64 {
            return Err(SupafleetError::InvalidArgument(format!(
                "instance id {} is above the supported maximum of {}",
                raw, MAX_INSTANCE_ID
            )));
        }

        Ok(Self(raw as u32))
    }

    /// Returns the raw id.
    pub fn get(self) -> u32 {
        self.0
    }

    /// Returns the registry key, `instance<id>`.
    pub fn registry_key(self) -> String {
        format!("{}{}", INSTANCE_PREFIX, self.0)
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl TryFrom<u32> for InstanceId {
    type Error = SupafleetError;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        Self::new(raw as i64)
    }
}

impl From<InstanceId> for u32 {
    fn from(id: InstanceId) -> Self {
        id.0
    }
}

impl FromStr for InstanceId {
    type Err = SupafleetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim().parse::<i64>().map_err(|_| {
            SupafleetError::InvalidArgument(format!("invalid instance id: {:?}", s))
        })?;

        Self::new(raw)
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_id_rejects_non_positive() {
        assert!(matches!(
            InstanceId::new(0),
            Err(SupafleetError::InvalidArgument(_))
        ));
        assert!(matches!(
            InstanceId::new(-3),
            Err(SupafleetError::InvalidArgument(_))
        ));
        assert!(matches!(
            "-1".parse::<InstanceId>(),
            Err(SupafleetError::InvalidArgument(_))
        ));
        assert!("abc".parse::<InstanceId>().is_err());
    }

    #[test]
    fn test_instance_id_rejects_out_of_range() {
        assert!(InstanceId::new(MAX_INSTANCE_ID as i64).is_ok());
        assert!(InstanceId::new(MAX_INSTANCE_ID as i64 + 1).is_err());
    }

    #[test]
    fn test_instance_id_serde() {
        let id: InstanceId = serde_json::from_str("7").unwrap();
        assert_eq!(id.get(), 7);
        assert_eq!(id.registry_key(), "instance7");
        assert_eq!(serde_json::to_string(&id).unwrap(), "7");
        assert!(serde_json::from_str::<InstanceId>("0").is_err());
    }
}
