//! Pet simulation: stat decay, the mood/activity state machine, and the
//! energy threshold rule, all driven through one authoritative engine so
//! no stale timer can mutate state behind the sim's back.

use crate::model::{
    Gauge, Gauges, PetState, DECAY_STEP, ENERGY_SLEEP_BELOW, ENERGY_WAKE_ABOVE, FEED_HAPPINESS,
    FEED_HUNGER, FEED_HUNGER_CAP, FEED_REVERT_MS, IDLE_DECAY_AFTER_MS, PET_ENERGY, PET_HAPPINESS,
    PET_REVERT_MS, PLAYBACK_HAPPINESS, PLAYBACK_REVERT_MS, SLEEP_ENERGY, TICK_MS,
};

/// A pending auto-revert, e.g. Happy falling back to Idle after a pet.
/// Applied by `advance` when due; dropped if `from` is no longer the
/// current state (the transition it was scheduled for got superseded).
#[derive(Clone, Copy, Debug)]
struct Revert {
    at_ms: u64,
    from: PetState,
    to: PetState,
}

pub(crate) struct PetSim {
    state: PetState,
    gauges: Gauges,
    clock_ms: u64,
    last_interaction_ms: u64,
    last_tick_ms: u64,
    revert: Option<Revert>,
}

impl PetSim {
    pub(crate) fn new() -> Self {
        Self {
            state: PetState::Idle,
            gauges: Gauges::default(),
            clock_ms: 0,
            last_interaction_ms: 0,
            last_tick_ms: 0,
            revert: None,
        }
    }

    pub(crate) fn state(&self) -> PetState {
        self.state
    }

    pub(crate) fn gauges(&self) -> &Gauges {
        &self.gauges
    }

    /// Advance the sim clock, replaying decay ticks and the pending
    /// auto-revert in timestamp order up to `now_ms`.
    pub(crate) fn advance(&mut self, now_ms: u64) {
        if now_ms > self.clock_ms {
            self.clock_ms = now_ms;
        }
        loop {
            let next_tick = self.last_tick_ms + TICK_MS;
            let next_revert = self.revert.map(|r| r.at_ms).unwrap_or(u64::MAX);
            if next_tick > self.clock_ms && next_revert > self.clock_ms {
                break;
            }
            // Ties go to the decay tick: the threshold rule it may trigger
            // is authoritative over a revert due at the same instant.
            if next_tick <= next_revert {
                self.run_decay_tick(next_tick);
            } else {
                self.apply_revert();
            }
        }
    }

    /// Adjust one gauge, clamped to [0, 100]. Counts as an interaction,
    /// and re-checks the energy thresholds if the energy value moved.
    pub(crate) fn apply_delta(&mut self, gauge: Gauge, delta: f32) {
        self.touch();
        if self.gauges.apply(gauge, delta) && gauge == Gauge::Energy {
            self.enforce_energy_thresholds();
        }
    }

    pub(crate) fn pet(&mut self) {
        if self.state == PetState::Sleeping {
            return;
        }
        self.state = PetState::Happy;
        self.schedule_revert(PetState::Idle, PET_REVERT_MS);
        self.apply_delta(Gauge::Happiness, PET_HAPPINESS);
        self.apply_delta(Gauge::Energy, PET_ENERGY);
    }

    pub(crate) fn feed(&mut self) {
        if self.state == PetState::Sleeping || self.gauges.hunger() >= FEED_HUNGER_CAP {
            return;
        }
        self.state = PetState::Eating;
        self.schedule_revert(PetState::Idle, FEED_REVERT_MS);
        self.apply_delta(Gauge::Hunger, FEED_HUNGER);
        self.apply_delta(Gauge::Happiness, FEED_HAPPINESS);
    }

    pub(crate) fn put_to_sleep(&mut self) {
        self.state = PetState::Sleeping;
        self.revert = None;
        // The grant re-checks thresholds: landing above the wake mark
        // wakes the pet right back up, a fully clamped grant does not.
        self.apply_delta(Gauge::Energy, SLEEP_ENERGY);
    }

    pub(crate) fn wake_up(&mut self) {
        if self.state != PetState::Sleeping {
            return;
        }
        self.state = PetState::Idle;
        self.revert = None;
        self.touch();
    }

    /// Recording or playback has the pet's mouth moving.
    pub(crate) fn begin_talking(&mut self) {
        self.state = PetState::Talking;
        self.revert = None;
        self.touch();
    }

    pub(crate) fn recording_stopped(&mut self) {
        self.state = PetState::Idle;
        self.revert = None;
        self.touch();
    }

    /// Natural end of playback. Ignored if the threshold rule already
    /// moved the pet out of Talking mid-playback.
    pub(crate) fn playback_finished(&mut self) {
        if self.state != PetState::Talking {
            return;
        }
        self.state = PetState::Happy;
        self.schedule_revert(PetState::Idle, PLAYBACK_REVERT_MS);
        self.apply_delta(Gauge::Happiness, PLAYBACK_HAPPINESS);
    }

    pub(crate) fn playback_failed(&mut self) {
        if self.state == PetState::Talking {
            self.state = PetState::Idle;
            self.revert = None;
        }
    }

    fn touch(&mut self) {
        self.last_interaction_ms = self.clock_ms;
    }

    fn schedule_revert(&mut self, to: PetState, delay_ms: u64) {
        self.revert = Some(Revert {
            at_ms: self.clock_ms + delay_ms,
            from: self.state,
            to,
        });
    }

    fn run_decay_tick(&mut self, at_ms: u64) {
        self.last_tick_ms = at_ms;
        if at_ms.saturating_sub(self.last_interaction_ms) > IDLE_DECAY_AFTER_MS {
            self.gauges.apply(Gauge::Hunger, -DECAY_STEP);
            self.gauges.apply(Gauge::Happiness, -DECAY_STEP);
            if self.gauges.apply(Gauge::Energy, -DECAY_STEP) {
                self.enforce_energy_thresholds();
            }
        }
    }

    fn apply_revert(&mut self) {
        if let Some(r) = self.revert.take() {
            if self.state == r.from {
                self.state = r.to;
            }
        }
    }

    fn enforce_energy_thresholds(&mut self) {
        if self.gauges.energy() < ENERGY_SLEEP_BELOW {
            if self.state != PetState::Sleeping {
                log::info!("energy {:.1}, forcing sleep", self.gauges.energy());
            }
            self.state = PetState::Sleeping;
            self.revert = None;
        } else if self.state == PetState::Sleeping && self.gauges.energy() > ENERGY_WAKE_ABOVE {
            self.state = PetState::Idle;
            self.revert = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn gauges_stay_in_range_under_any_sequence() {
        let mut sim = PetSim::new();
        for (i, delta) in [250.0, -37.5, -400.0, 12.3, 999.0, -0.1, 55.5]
            .into_iter()
            .enumerate()
        {
            sim.apply_delta(Gauge::Hunger, delta);
            sim.apply_delta(Gauge::Happiness, -delta);
            sim.apply_delta(Gauge::Energy, delta);
            sim.advance((i as u64 + 1) * 7000);
            for v in [
                sim.gauges().hunger(),
                sim.gauges().happiness(),
                sim.gauges().energy(),
            ] {
                assert!((0.0..=100.0).contains(&v), "gauge out of range: {v}");
            }
        }
    }

    #[test]
    fn no_decay_within_idle_grace_period() {
        let mut sim = PetSim::new();
        sim.advance(5000);
        assert!(close(sim.gauges().hunger(), 50.0));
        assert!(close(sim.gauges().happiness(), 50.0));
        assert!(close(sim.gauges().energy(), 50.0));
    }

    #[test]
    fn idle_decay_kicks_in_after_grace_period() {
        let mut sim = PetSim::new();
        sim.advance(8000);
        // Ticks at 6, 7 and 8 seconds each shave 0.1 off every gauge.
        assert!(close(sim.gauges().hunger(), 49.7));
        assert!(close(sim.gauges().happiness(), 49.7));
        assert!(close(sim.gauges().energy(), 49.7));
    }

    #[test]
    fn decay_bottoms_out_at_zero_and_holds() {
        let mut sim = PetSim::new();
        sim.apply_delta(Gauge::Hunger, -49.5);
        let mut prev = sim.gauges().hunger();
        for s in 1..40 {
            sim.advance(s * 1000);
            let cur = sim.gauges().hunger();
            assert!(cur <= prev);
            prev = cur;
        }
        assert_eq!(sim.gauges().hunger(), 0.0);
        sim.advance(120_000);
        assert_eq!(sim.gauges().hunger(), 0.0);
    }

    #[test]
    fn low_energy_forces_sleep_and_recovery_wakes() {
        let mut sim = PetSim::new();
        sim.apply_delta(Gauge::Energy, -35.0);
        assert_eq!(sim.state(), PetState::Sleeping);
        sim.apply_delta(Gauge::Energy, 20.0);
        assert_eq!(sim.state(), PetState::Idle);
    }

    #[test]
    fn threshold_rule_overrides_pending_revert() {
        let mut sim = PetSim::new();
        sim.pet();
        assert_eq!(sim.state(), PetState::Happy);
        // Drive energy below the sleep mark while the revert is pending.
        sim.apply_delta(Gauge::Energy, -40.0);
        assert_eq!(sim.state(), PetState::Sleeping);
        sim.advance(2000);
        assert_eq!(sim.state(), PetState::Sleeping);
    }

    #[test]
    fn feed_is_a_noop_when_full() {
        let mut sim = PetSim::new();
        sim.apply_delta(Gauge::Hunger, 45.0);
        sim.advance(3000);
        let stamp = sim.last_interaction_ms;
        sim.feed();
        assert_eq!(sim.state(), PetState::Idle);
        assert!(close(sim.gauges().hunger(), 95.0));
        assert!(close(sim.gauges().happiness(), 50.0));
        assert_eq!(sim.last_interaction_ms, stamp);
    }

    #[test]
    fn feed_is_a_noop_while_sleeping() {
        let mut sim = PetSim::new();
        sim.apply_delta(Gauge::Energy, -40.0);
        assert_eq!(sim.state(), PetState::Sleeping);
        let hunger = sim.gauges().hunger();
        sim.feed();
        assert_eq!(sim.state(), PetState::Sleeping);
        assert_eq!(sim.gauges().hunger(), hunger);
    }

    #[test]
    fn feed_fills_up_and_reverts_to_idle() {
        let mut sim = PetSim::new();
        sim.feed();
        assert_eq!(sim.state(), PetState::Eating);
        assert!(close(sim.gauges().hunger(), 80.0));
        assert!(close(sim.gauges().happiness(), 60.0));
        sim.advance(FEED_REVERT_MS);
        assert_eq!(sim.state(), PetState::Idle);
    }

    #[test]
    fn pet_makes_happy_then_reverts_to_idle() {
        let mut sim = PetSim::new();
        sim.pet();
        assert_eq!(sim.state(), PetState::Happy);
        assert!(close(sim.gauges().happiness(), 65.0));
        assert!(close(sim.gauges().energy(), 55.0));
        sim.advance(1499);
        assert_eq!(sim.state(), PetState::Happy);
        sim.advance(1500);
        assert_eq!(sim.state(), PetState::Idle);
    }

    #[test]
    fn pet_is_ignored_while_sleeping() {
        let mut sim = PetSim::new();
        sim.apply_delta(Gauge::Energy, -40.0);
        let happiness = sim.gauges().happiness();
        sim.pet();
        assert_eq!(sim.state(), PetState::Sleeping);
        assert_eq!(sim.gauges().happiness(), happiness);
    }

    #[test]
    fn sleep_grant_above_wake_mark_wakes_immediately() {
        let mut sim = PetSim::new();
        sim.put_to_sleep();
        // 50 + 40 lands above the wake mark, so the threshold rule
        // bounces the pet straight back awake.
        assert_eq!(sim.state(), PetState::Idle);
        assert!(close(sim.gauges().energy(), 90.0));
    }

    #[test]
    fn sleep_sticks_when_grant_is_fully_clamped() {
        let mut sim = PetSim::new();
        sim.apply_delta(Gauge::Energy, 50.0);
        sim.put_to_sleep();
        assert_eq!(sim.state(), PetState::Sleeping);
        assert_eq!(sim.gauges().energy(), 100.0);
    }

    #[test]
    fn wake_up_only_applies_while_sleeping() {
        let mut sim = PetSim::new();
        sim.pet();
        sim.wake_up();
        assert_eq!(sim.state(), PetState::Happy);

        let mut sim = PetSim::new();
        sim.apply_delta(Gauge::Energy, 50.0);
        sim.put_to_sleep();
        sim.wake_up();
        assert_eq!(sim.state(), PetState::Idle);
    }

    #[test]
    fn stale_revert_does_not_fire_after_talking_starts() {
        let mut sim = PetSim::new();
        sim.pet();
        sim.begin_talking();
        sim.advance(5000);
        assert_eq!(sim.state(), PetState::Talking);
    }

    #[test]
    fn playback_finished_grants_happiness_then_reverts() {
        let mut sim = PetSim::new();
        sim.begin_talking();
        sim.playback_finished();
        assert_eq!(sim.state(), PetState::Happy);
        assert!(close(sim.gauges().happiness(), 70.0));
        sim.advance(PLAYBACK_REVERT_MS);
        assert_eq!(sim.state(), PetState::Idle);
    }

    #[test]
    fn playback_outcome_ignored_when_no_longer_talking() {
        let mut sim = PetSim::new();
        sim.begin_talking();
        sim.apply_delta(Gauge::Energy, -40.0);
        assert_eq!(sim.state(), PetState::Sleeping);
        let happiness = sim.gauges().happiness();
        sim.playback_finished();
        assert_eq!(sim.state(), PetState::Sleeping);
        assert_eq!(sim.gauges().happiness(), happiness);
    }
}
