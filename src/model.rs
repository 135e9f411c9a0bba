//! Pure data: gauges, pet states, and the tuning constants the sim runs on.

/// Decay tick period.
pub(crate) const TICK_MS: u64 = 1000;
/// Gauges start decaying once the user has been idle this long.
pub(crate) const IDLE_DECAY_AFTER_MS: u64 = 5000;
/// Per-tick decay applied to each gauge while idle.
pub(crate) const DECAY_STEP: f32 = 0.1;

pub(crate) const PET_HAPPINESS: f32 = 15.0;
pub(crate) const PET_ENERGY: f32 = 5.0;
pub(crate) const PET_REVERT_MS: u64 = 1500;

pub(crate) const FEED_HUNGER: f32 = 30.0;
pub(crate) const FEED_HAPPINESS: f32 = 10.0;
/// Feeding is refused at or above this hunger level.
pub(crate) const FEED_HUNGER_CAP: f32 = 90.0;
pub(crate) const FEED_REVERT_MS: u64 = 2000;

pub(crate) const PLAYBACK_HAPPINESS: f32 = 20.0;
pub(crate) const PLAYBACK_REVERT_MS: u64 = 2000;

pub(crate) const SLEEP_ENERGY: f32 = 40.0;
/// Energy below this forces sleep; while asleep, energy above the wake
/// mark forces waking.
pub(crate) const ENERGY_SLEEP_BELOW: f32 = 20.0;
pub(crate) const ENERGY_WAKE_ABOVE: f32 = 30.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PetState {
    Idle,
    Talking,
    Happy,
    Eating,
    Sleeping,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Scene {
    Main,
    Help,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Gauge {
    Hunger,
    Happiness,
    Energy,
}

/// Three bounded stat gauges, each clamped to [0, 100] on every mutation.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Gauges {
    hunger: f32,
    happiness: f32,
    energy: f32,
}

impl Default for Gauges {
    fn default() -> Self {
        Self {
            hunger: 50.0,
            happiness: 50.0,
            energy: 50.0,
        }
    }
}

impl Gauges {
    pub(crate) fn hunger(&self) -> f32 {
        self.hunger
    }

    pub(crate) fn happiness(&self) -> f32 {
        self.happiness
    }

    pub(crate) fn energy(&self) -> f32 {
        self.energy
    }

    /// Apply `delta` to one gauge, clamped to [0, 100].
    /// Returns whether the stored value actually changed (a fully
    /// clamped-out delta reports `false`).
    pub(crate) fn apply(&mut self, gauge: Gauge, delta: f32) -> bool {
        let slot = match gauge {
            Gauge::Hunger => &mut self.hunger,
            Gauge::Happiness => &mut self.happiness,
            Gauge::Energy => &mut self.energy,
        };
        let next = (*slot + delta).clamp(0.0, 100.0);
        let changed = next != *slot;
        *slot = next;
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_clamps_both_ends() {
        let mut g = Gauges::default();
        assert!(g.apply(Gauge::Hunger, 500.0));
        assert_eq!(g.hunger(), 100.0);
        assert!(g.apply(Gauge::Hunger, -500.0));
        assert_eq!(g.hunger(), 0.0);
    }

    #[test]
    fn fully_clamped_delta_reports_unchanged() {
        let mut g = Gauges::default();
        g.apply(Gauge::Energy, 50.0);
        assert_eq!(g.energy(), 100.0);
        assert!(!g.apply(Gauge::Energy, 40.0));
        assert_eq!(g.energy(), 100.0);
    }
}
