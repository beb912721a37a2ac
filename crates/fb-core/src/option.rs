//! Option contract enums shared by every engine.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Real;

/// Call or put.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    /// A call option (right to buy).
    Call,
    /// A put option (right to sell).
    Put,
}

impl OptionType {
    /// +1 for Call, −1 for Put.
    pub fn sign(self) -> Real {
        match self {
            OptionType::Call => 1.0,
            OptionType::Put => -1.0,
        }
    }

    /// Intrinsic value `max(±(spot − strike), 0)`.
    #[inline]
    pub fn intrinsic(self, spot: Real, strike: Real) -> Real {
        (self.sign() * (spot - strike)).max(0.0)
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionType::Call => write!(f, "Call"),
            OptionType::Put => write!(f, "Put"),
        }
    }
}

/// When the holder may exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExerciseStyle {
    /// Exercise at maturity only.
    European,
    /// Exercise at any time up to maturity.
    #[default]
    American,
}

/// How equality between continuation and exercise value is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Exercise when `intrinsic >= continuation`.
    #[default]
    ExerciseOnTie,
    /// Exercise only when `intrinsic > continuation`.
    ContinueOnTie,
}

impl TieBreak {
    /// Whether a holder facing these two values exercises.
    #[inline]
    pub fn exercises(self, intrinsic: Real, continuation: Real) -> bool {
        match self {
            TieBreak::ExerciseOnTie => intrinsic >= continuation,
            TieBreak::ContinueOnTie => intrinsic > continuation,
        }
    }
}

/// Direction and effect of a single barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarrierKind {
    /// Activated when spot rises to the barrier.
    UpIn,
    /// Extinguished when spot rises to the barrier.
    UpOut,
    /// Activated when spot falls to the barrier.
    DownIn,
    /// Extinguished when spot falls to the barrier.
    DownOut,
}

impl BarrierKind {
    /// Barrier sits above spot.
    pub fn is_up(self) -> bool {
        matches!(self, BarrierKind::UpIn | BarrierKind::UpOut)
    }

    /// Touching the barrier extinguishes the option.
    pub fn is_knock_out(self) -> bool {
        matches!(self, BarrierKind::UpOut | BarrierKind::DownOut)
    }

    /// The knock-out with the same barrier direction.
    pub fn knock_out(self) -> Self {
        if self.is_up() {
            BarrierKind::UpOut
        } else {
            BarrierKind::DownOut
        }
    }

    /// Whether `spot` is at or beyond `level`.
    #[inline]
    pub fn is_triggered(self, spot: Real, level: Real) -> bool {
        if self.is_up() {
            spot >= level
        } else {
            spot <= level
        }
    }
}
