// src/types.rs

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};

use crate::error::ControlError;

/// One of the four approaches to the intersection. Declaration order is the
/// round-robin service order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Lane {
    A,
    B,
    C,
    D,
}

impl Lane {
    /// All lanes in cycle order.
    pub const ALL: [Lane; 4] = [Lane::A, Lane::B, Lane::C, Lane::D];

    pub fn as_str(&self) -> &'static str {
        match self {
            Lane::A => "A",
            Lane::B => "B",
            Lane::C => "C",
            Lane::D => "D",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Lane::A => 0,
            Lane::B => 1,
            Lane::C => 2,
            Lane::D => 3,
        }
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Lane {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A" | "a" => Ok(Lane::A),
            "B" | "b" => Ok(Lane::B),
            "C" | "c" => Ok(Lane::C),
            "D" | "d" => Ok(Lane::D),
            other => Err(ControlError::InvalidLane(other.to_string())),
        }
    }
}

impl Serialize for Lane {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Lane {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Vehicle counts for all four lanes. Always fully populated, so a missing
/// lane is unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LaneCounts {
    counts: [u32; 4],
}

impl LaneCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, lane: Lane) -> u32 {
        self.counts[lane.index()]
    }

    pub fn set(&mut self, lane: Lane, count: u32) {
        self.counts[lane.index()] = count;
    }

    pub fn iter(&self) -> impl Iterator<Item = (Lane, u32)> + '_ {
        Lane::ALL.iter().map(move |&lane| (lane, self.get(lane)))
    }

    pub fn to_map(&self) -> BTreeMap<Lane, u32> {
        self.iter().collect()
    }
}

/// A decoded video frame, packed RGB8, row-major.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
    /// Seconds from stream start.
    pub timestamp: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lane_parsing_accepts_four_letters() {
        assert_eq!("A".parse::<Lane>().unwrap(), Lane::A);
        assert_eq!("d".parse::<Lane>().unwrap(), Lane::D);
        assert_eq!(" b ".parse::<Lane>().unwrap(), Lane::B);
    }

    #[test]
    fn test_lane_parsing_rejects_unknown_identifiers() {
        let err = "E".parse::<Lane>().unwrap_err();
        assert!(err.to_string().contains("unknown lane 'E'"));
    }

    #[test]
    fn test_cycle_order_is_a_to_d() {
        assert_eq!(Lane::ALL, [Lane::A, Lane::B, Lane::C, Lane::D]);
        assert_eq!(Lane::C.to_string(), "C");
    }

    #[test]
    fn test_lane_serializes_as_its_letter() {
        assert_eq!(serde_json::to_string(&Lane::B).unwrap(), "\"B\"");
        let lane: Lane = serde_json::from_str("\"c\"").unwrap();
        assert_eq!(lane, Lane::C);
    }

    #[test]
    fn test_counts_start_at_zero_and_overwrite() {
        let mut counts = LaneCounts::new();
        assert_eq!(counts.get(Lane::B), 0);

        counts.set(Lane::B, 12);
        counts.set(Lane::B, 7);
        assert_eq!(counts.get(Lane::B), 7);

        let map = counts.to_map();
        assert_eq!(map.len(), 4);
        assert_eq!(map[&Lane::B], 7);
        assert_eq!(map[&Lane::D], 0);
    }
}
