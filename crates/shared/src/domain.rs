use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id_newtype!(RequestId);
string_id_newtype!(ContentId);

/// Deal status codes agreed upon with the storage gateway.
///
/// The set is closed: a code outside of it means the gateway broke its
/// contract, so [`DealStatus::from_code`] returns `None` instead of guessing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealStatus {
    Unknown,
    Pending,
    Active,
    Success,
    Error,
}

impl DealStatus {
    pub const ALL: [DealStatus; 5] = [
        DealStatus::Unknown,
        DealStatus::Pending,
        DealStatus::Active,
        DealStatus::Success,
        DealStatus::Error,
    ];

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Unknown),
            1 => Some(Self::Pending),
            2 => Some(Self::Active),
            3 => Some(Self::Success),
            4 => Some(Self::Error),
            _ => None,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Self::Unknown => 0,
            Self::Pending => 1,
            Self::Active => 2,
            Self::Success => 3,
            Self::Error => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Pending => "Pending",
            Self::Active => "Active",
            Self::Success => "Success",
            Self::Error => "Error",
        }
    }
}

impl fmt::Display for DealStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_map_to_labels_and_back() {
        for status in DealStatus::ALL {
            assert_eq!(DealStatus::from_code(status.code()), Some(status));
        }
        assert_eq!(DealStatus::from_code(2).map(DealStatus::label), Some("Active"));
    }

    #[test]
    fn unknown_codes_are_rejected() {
        assert_eq!(DealStatus::from_code(-1), None);
        assert_eq!(DealStatus::from_code(5), None);
    }

    #[test]
    fn blank_request_id_counts_as_empty() {
        assert!(RequestId::new("").is_empty());
        assert!(RequestId::new("   ").is_empty());
        assert!(!RequestId::new("r1").is_empty());
    }
}
