//! Compilation phase markers exposed to an external observability layer.

use std::fmt;

/// Stable identifier for one logical query unit: the outer query, each CTE
/// body, and each set-operation branch get their own id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnitId(pub u32);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit_{}", self.0)
    }
}

/// Discrete phases per logical query unit.
///
/// Ordering contract: Begin before From; From before Where; Where before
/// GroupBy/Select; End terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryPhase {
    Begin,
    From,
    Where,
    GroupBy,
    Select,
    End,
}

impl fmt::Display for QueryPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Begin => "Begin",
            Self::From => "From",
            Self::Where => "Where",
            Self::GroupBy => "GroupBy",
            Self::Select => "Select",
            Self::End => "End",
        };
        write!(f, "{s}")
    }
}

pub trait PhaseObserver {
    fn on_phase(&mut self, unit: UnitId, phase: QueryPhase);
}

/// Default observer emitting tracing events.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl PhaseObserver for TracingObserver {
    fn on_phase(&mut self, unit: UnitId, phase: QueryPhase) {
        tracing::debug!(%unit, %phase, "query phase");
    }
}

/// Observer that records events, used in tests and by hosts that want the
/// raw marker stream.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub events: Vec<(UnitId, QueryPhase)>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        RecordingObserver::default()
    }

    /// Events for one unit, in emission order.
    pub fn unit_phases(&self, unit: UnitId) -> Vec<QueryPhase> {
        self.events
            .iter()
            .filter(|(u, _)| *u == unit)
            .map(|(_, p)| *p)
            .collect()
    }

    pub fn unit_ids(&self) -> Vec<UnitId> {
        let mut ids = Vec::new();
        for (unit, _) in &self.events {
            if !ids.contains(unit) {
                ids.push(*unit);
            }
        }
        ids
    }
}

impl PhaseObserver for RecordingObserver {
    fn on_phase(&mut self, unit: UnitId, phase: QueryPhase) {
        self.events.push((unit, phase));
    }
}

/// Check one unit's marker stream against the ordering contract.
pub fn phases_well_ordered(phases: &[QueryPhase]) -> bool {
    fn rank(phase: QueryPhase) -> u8 {
        match phase {
            QueryPhase::Begin => 0,
            QueryPhase::From => 1,
            QueryPhase::Where => 2,
            // GroupBy and Select are unordered relative to each other.
            QueryPhase::GroupBy | QueryPhase::Select => 3,
            QueryPhase::End => 4,
        }
    }

    if phases.first() != Some(&QueryPhase::Begin) {
        return false;
    }
    if phases.last() != Some(&QueryPhase::End) {
        return false;
    }
    phases.windows(2).all(|w| rank(w[0]) <= rank(w[1]))
        && phases.iter().filter(|p| **p == QueryPhase::End).count() == 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_check() {
        use QueryPhase::*;
        assert!(phases_well_ordered(&[Begin, From, Where, GroupBy, Select, End]));
        assert!(phases_well_ordered(&[Begin, From, Select, End]));
        assert!(!phases_well_ordered(&[From, Begin, Select, End]));
        assert!(!phases_well_ordered(&[Begin, Select, From, End]));
        assert!(!phases_well_ordered(&[Begin, End, Select]));
    }
}
