use std::{
    fmt::Display,
    ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const NPR_CURRENCY_CODE: &str = "NPR";

//--------------------------------------       Paisa         ---------------------------------------------------------
/// A fixed-point Nepali rupee amount, stored as an integer number of paisa (1 NPR = 100 paisa).
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct Paisa(i64);

op!(binary Paisa, Add, add);
op!(binary Paisa, Sub, sub);
op!(inplace Paisa, AddAssign, add_assign);
op!(inplace Paisa, SubAssign, sub_assign);
op!(unary Paisa, Neg, neg);
op!(scale Paisa, i64, Mul, mul);
op!(sum Paisa);

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Value cannot be represented in paisa: {0}")]
pub struct PaisaConversionError(String);

impl From<i64> for Paisa {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<u64> for Paisa {
    type Error = PaisaConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(PaisaConversionError(format!("Value {value} is too large to convert to Paisa")))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for Paisa {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Rs {}", self.to_rupee_string())
    }
}

/// Parses a rupee amount as sent by the payment gateways, e.g. `"100"`, `"100.5"` or `"1,100.50"`.
impl FromStr for Paisa {
    type Err = PaisaConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cleaned = s.trim().replace(',', "");
        let (negative, digits) = match cleaned.strip_prefix('-') {
            Some(rest) => (true, rest.to_string()),
            None => (false, cleaned),
        };
        let (whole, frac) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits.as_str(), ""),
        };
        let invalid = || PaisaConversionError(s.to_string());
        if (whole.is_empty() && frac.is_empty()) || frac.len() > 2 {
            return Err(invalid());
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let rupees = if whole.is_empty() { 0 } else { whole.parse::<i64>().map_err(|_| invalid())? };
        let paisa = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| invalid())? * 10,
            _ => frac.parse::<i64>().map_err(|_| invalid())?,
        };
        let value = rupees.checked_mul(100).and_then(|r| r.checked_add(paisa)).ok_or_else(invalid)?;
        Ok(Self(if negative { -value } else { value }))
    }
}

impl Paisa {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_rupees(rupees: i64) -> Self {
        Self(rupees * 100)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Renders the amount in rupees without a currency marker. Whole amounts have no decimal part (`"100"`) and
    /// trailing zeros are dropped otherwise (`"100.5"`, `"100.25"`).
    pub fn to_rupee_string(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let (rupees, paisa) = (abs / 100, abs % 100);
        match paisa {
            0 => format!("{sign}{rupees}"),
            p if p % 10 == 0 => format!("{sign}{rupees}.{}", p / 10),
            p => format!("{sign}{rupees}.{p:02}"),
        }
    }
}
