//! Drag operations (`dropEffect`) and the set a gesture allows (`effectAllowed`).

use serde::{Deserialize, Serialize};
use std::fmt;

/// The operation a drop would perform on the dragged resource.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    #[default]
    None,
    Copy,
    Move,
    Link,
}

impl OperationKind {
    pub const ALL: [OperationKind; 4] = [
        OperationKind::None,
        OperationKind::Copy,
        OperationKind::Move,
        OperationKind::Link,
    ];

    /// Preference order used when no handler has chosen an operation.
    const DEFAULT_ORDER: [OperationKind; 3] =
        [OperationKind::Copy, OperationKind::Link, OperationKind::Move];

    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::None => "none",
            OperationKind::Copy => "copy",
            OperationKind::Move => "move",
            OperationKind::Link => "link",
        }
    }

    /// Parses a `dropEffect` keyword. Keywords are case-sensitive.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == keyword)
    }

    /// `Move` removes the source; everything else leaves it intact.
    pub fn is_destructive(self) -> bool {
        matches!(self, OperationKind::Move)
    }

    fn bit(self) -> u8 {
        match self {
            OperationKind::None => 0,
            OperationKind::Copy => 0b001,
            OperationKind::Move => 0b010,
            OperationKind::Link => 0b100,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Set of operations the initiating context declared. `None` is always a
/// member: a handler may refuse a drop regardless of what the source allows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllowedOperations(u8);

impl AllowedOperations {
    pub const NONE: Self = Self(0);
    pub const COPY: Self = Self(0b001);
    pub const MOVE: Self = Self(0b010);
    pub const LINK: Self = Self(0b100);
    pub const ALL: Self = Self(0b111);

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn contains(self, op: OperationKind) -> bool {
        op == OperationKind::None || self.0 & op.bit() != 0
    }

    /// `true` when nothing but `None` is allowed.
    pub fn is_empty(self) -> bool {
        self.0 & Self::ALL.0 == 0
    }

    /// Non-`None` members in `Copy, Move, Link` order.
    pub fn iter(self) -> impl Iterator<Item = OperationKind> {
        OperationKind::ALL
            .into_iter()
            .filter(move |op| *op != OperationKind::None && self.contains(*op))
    }

    /// First allowed of `Copy`, `Link`, `Move`; `None` if nothing is allowed.
    pub fn default_operation(self) -> OperationKind {
        OperationKind::DEFAULT_ORDER
            .into_iter()
            .find(|op| self.contains(*op))
            .unwrap_or(OperationKind::None)
    }

    /// Parses an `effectAllowed` keyword. `uninitialized` allows everything.
    pub fn from_effect_allowed(keyword: &str) -> Option<Self> {
        let set = match keyword {
            "none" => Self::NONE,
            "copy" => Self::COPY,
            "move" => Self::MOVE,
            "link" => Self::LINK,
            "copyMove" => Self::COPY.union(Self::MOVE),
            "copyLink" => Self::COPY.union(Self::LINK),
            "linkMove" => Self::LINK.union(Self::MOVE),
            "all" | "uninitialized" => Self::ALL,
            _ => return None,
        };
        Some(set)
    }

    pub fn as_effect_allowed(self) -> &'static str {
        match self.0 & Self::ALL.0 {
            0b000 => "none",
            0b001 => "copy",
            0b010 => "move",
            0b100 => "link",
            0b011 => "copyMove",
            0b101 => "copyLink",
            0b110 => "linkMove",
            _ => "all",
        }
    }
}

impl From<OperationKind> for AllowedOperations {
    fn from(op: OperationKind) -> Self {
        Self(op.bit())
    }
}

impl FromIterator<OperationKind> for AllowedOperations {
    fn from_iter<I: IntoIterator<Item = OperationKind>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::NONE, |set, op| set.union(Self::from(op)))
    }
}

impl fmt::Display for AllowedOperations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_effect_allowed())
    }
}
