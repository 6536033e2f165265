use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(OrderStatus {
    Pending => "pending",
    Preparing => "preparing",
    PickedUp => "picked_up",
});

str_enum!(ItemKind {
    Regular => "regular",
    Edge => "edge",
});

str_enum!(Role {
    Patient => "patient",
    Doctor => "doctor",
    Pharmacist => "pharmacist",
    Admin => "admin",
});

/// Medicine names that need non-tablet packing (liquids, injectables,
/// topical forms). Longer handling time at the packing desk.
pub const EDGE_CASE_KEYWORDS: &[&str] = &[
    "syrup",
    "injection",
    "suspension",
    "cream",
    "ointment",
    "drops",
    "gel",
];

impl ItemKind {
    /// Classify a medicine name by packing kind. Static keyword check,
    /// case-insensitive.
    pub fn classify(name: &str) -> Self {
        let lower = name.to_lowercase();
        if EDGE_CASE_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            ItemKind::Edge
        } else {
            ItemKind::Regular
        }
    }
}
