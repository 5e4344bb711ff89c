//! Mobile operator to partner routing code mapping.

use serde::{Deserialize, Serialize};

/// Operator named in a transaction payload.
///
/// Closed set: any name outside the known carriers maps to [`Operator::Other`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    TrueMove,
    Dtac,
    Ais,
    Other,
}

impl Operator {
    /// Case-sensitive match on the producer's operator name.
    pub fn from_name(name: &str) -> Self {
        match name {
            "TRUEMOVE" => Self::TrueMove,
            "DTAC" => Self::Dtac,
            "AIS" => Self::Ais,
            _ => Self::Other,
        }
    }

    pub fn routing_code(self) -> RoutingCode {
        match self {
            Self::TrueMove => RoutingCode::TRUEMOVE,
            Self::Dtac => RoutingCode::DTAC,
            Self::Ais => RoutingCode::AIS,
            Self::Other => RoutingCode::DEFAULT,
        }
    }
}

/// Operator code as stored in the partner routing table.
///
/// The lookup column is text, so the code is kept in its string form.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct RoutingCode(&'static str);

impl RoutingCode {
    pub const DEFAULT: Self = Self("0");
    pub const TRUEMOVE: Self = Self("1");
    pub const DTAC: Self = Self("2");
    pub const AIS: Self = Self("3");

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl core::fmt::Display for RoutingCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn known_operators_map_to_their_codes() {
        assert_eq!(Operator::from_name("TRUEMOVE").routing_code().as_str(), "1");
        assert_eq!(Operator::from_name("DTAC").routing_code().as_str(), "2");
        assert_eq!(Operator::from_name("AIS").routing_code().as_str(), "3");
    }

    #[test]
    fn match_is_case_sensitive() {
        assert_eq!(Operator::from_name("ais"), Operator::Other);
        assert_eq!(Operator::from_name("Dtac"), Operator::Other);
    }

    proptest! {
        #[test]
        fn unknown_names_fall_back_to_default(name in "\\PC*") {
            prop_assume!(!matches!(name.as_str(), "TRUEMOVE" | "DTAC" | "AIS"));
            prop_assert_eq!(Operator::from_name(&name).routing_code(), RoutingCode::DEFAULT);
        }
    }
}
