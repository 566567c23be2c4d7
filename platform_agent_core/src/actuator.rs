use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{Button, ButtonSet, map::SpriteGrid, policy::ActionPlan};

/// The game backend the agent plays against.
///
/// Every call is synchronous. Pressing a held button or releasing a released
/// one is a no-op.
pub trait Simulation {
    /// Samples the visible play area.
    fn grid_snapshot(&self) -> SpriteGrid;

    /// Advances simulated time by one tick batch.
    fn advance_tick(&mut self);

    fn send_input(&mut self, button: Button);

    fn release_input(&mut self, button: Button);

    /// Whether the episode has ended.
    fn is_terminal(&self) -> bool;

    /// Starts a fresh episode.
    fn reset(&mut self);
}

/// Whether forward motion stays asserted while a plan runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SprintMode {
    /// Hold the maintenance buttons alongside every plan.
    #[default]
    Concurrent,
    /// Run plans with only their own buttons.
    Exclusive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActuatorConfig {
    pub sprint: SprintMode,
    /// Buttons asserted for the whole cycle in [`SprintMode::Concurrent`].
    pub maintenance: ButtonSet,
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            sprint: SprintMode::Concurrent,
            maintenance: ButtonSet::of(&[Button::Right, Button::B]),
        }
    }
}

/// What happened while a plan was executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actuation {
    /// Tick batches actually advanced.
    pub ticks: u32,
    /// The episode ended before or during the plan.
    pub terminated: bool,
}

/// Executes plans as press, hold, release sequences.
#[derive(Debug, Clone, Default)]
pub struct TimedInputActuator {
    config: ActuatorConfig,
}

impl TimedInputActuator {
    pub fn new(config: ActuatorConfig) -> Self {
        Self { config }
    }

    /// Buttons held outside the plan bracket for this plan.
    ///
    /// Buttons the plan holds itself are left to the plan so the two never
    /// share a release point.
    pub fn maintenance_for(&self, plan: &ActionPlan) -> ButtonSet {
        match self.config.sprint {
            SprintMode::Concurrent => self.config.maintenance.difference(plan.buttons()),
            SprintMode::Exclusive => ButtonSet::EMPTY,
        }
    }

    /// Holds the plan's buttons for `plan.duration()` ticks, then releases them.
    ///
    /// The terminal state is checked before every tick. Every button pressed
    /// here is released before returning.
    pub fn execute<S: Simulation + ?Sized>(&self, sim: &mut S, plan: ActionPlan) -> Actuation {
        if sim.is_terminal() {
            return Actuation {
                ticks: 0,
                terminated: true,
            };
        }

        let maintenance = self.maintenance_for(&plan);
        for button in maintenance.iter() {
            sim.send_input(button);
        }

        let mut ticks = 0;
        let mut terminated = false;
        while ticks < plan.duration() {
            if sim.is_terminal() {
                terminated = true;
                break;
            }
            for button in plan.buttons().iter() {
                sim.send_input(button);
            }
            sim.advance_tick();
            ticks += 1;
        }
        terminated |= sim.is_terminal();

        for button in plan.buttons().iter() {
            sim.release_input(button);
        }
        for button in maintenance.iter() {
            sim.release_input(button);
        }

        trace!(
            ticks,
            duration = plan.duration(),
            terminated,
            "Plan executed"
        );
        Actuation { ticks, terminated }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Call {
        Press(Button),
        Release(Button),
        Tick,
    }

    #[derive(Default)]
    struct Recorder {
        calls: Vec<Call>,
        held: ButtonSet,
        ticks: u32,
        terminal_at: Option<u32>,
    }

    impl Simulation for Recorder {
        fn grid_snapshot(&self) -> SpriteGrid {
            SpriteGrid::empty()
        }
        fn advance_tick(&mut self) {
            self.ticks += 1;
            self.calls.push(Call::Tick);
        }
        fn send_input(&mut self, button: Button) {
            self.held.insert(button);
            self.calls.push(Call::Press(button));
        }
        fn release_input(&mut self, button: Button) {
            self.held.remove(button);
            self.calls.push(Call::Release(button));
        }
        fn is_terminal(&self) -> bool {
            self.terminal_at.is_some_and(|t| self.ticks >= t)
        }
        fn reset(&mut self) {
            *self = Recorder::default();
        }
    }

    #[test]
    fn exclusive_mode_brackets_only_plan_buttons() {
        let actuator = TimedInputActuator::new(ActuatorConfig {
            sprint: SprintMode::Exclusive,
            ..ActuatorConfig::default()
        });
        let mut sim = Recorder::default();
        let plan = ActionPlan::new(2, ButtonSet::of(&[Button::A])).unwrap();

        let outcome = actuator.execute(&mut sim, plan);

        assert_eq!(outcome, Actuation { ticks: 2, terminated: false });
        assert_eq!(
            sim.calls,
            vec![
                Call::Press(Button::A),
                Call::Tick,
                Call::Press(Button::A),
                Call::Tick,
                Call::Release(Button::A),
            ]
        );
    }

    #[test]
    fn concurrent_mode_releases_maintenance_after_plan() {
        let actuator = TimedInputActuator::default();
        let mut sim = Recorder::default();

        actuator.execute(&mut sim, ActionPlan::TAP_JUMP);

        assert_eq!(
            sim.calls,
            vec![
                Call::Press(Button::Right),
                Call::Press(Button::B),
                Call::Press(Button::A),
                Call::Tick,
                Call::Release(Button::A),
                Call::Release(Button::Right),
                Call::Release(Button::B),
            ]
        );
        assert!(sim.held.is_empty());
    }

    #[test]
    fn sprint_plan_needs_no_separate_maintenance() {
        let actuator = TimedInputActuator::default();
        assert!(actuator.maintenance_for(&ActionPlan::SPRINT).is_empty());
        assert_eq!(
            actuator.maintenance_for(&ActionPlan::LONG_JUMP),
            ButtonSet::of(&[Button::Right, Button::B])
        );
    }

    #[test]
    fn terminal_episode_presses_nothing() {
        let actuator = TimedInputActuator::default();
        let mut sim = Recorder {
            terminal_at: Some(0),
            ..Recorder::default()
        };
        let outcome = actuator.execute(&mut sim, ActionPlan::MEDIUM_JUMP);
        assert_eq!(outcome, Actuation { ticks: 0, terminated: true });
        assert!(sim.calls.is_empty());
    }
}
