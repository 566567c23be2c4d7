mod common;

use common::{ScriptedSimulation, flat_level};
use platform_agent_core::{
    Button, ButtonSet, Position,
    actuator::{Actuation, ActuatorConfig, Simulation, SprintMode, TimedInputActuator},
    policy::ActionPlan,
};

fn jump(duration: u32) -> ActionPlan {
    ActionPlan::new(duration, ButtonSet::of(&[Button::A])).unwrap()
}

#[test]
fn test_duration_advances_exact_ticks() {
    let actuator = TimedInputActuator::default();
    let mut sim = ScriptedSimulation::with_agent(Position::new(5, 12));

    let outcome = actuator.execute(&mut sim, jump(5));

    assert_eq!(outcome, Actuation { ticks: 5, terminated: false });
    assert_eq!(sim.ticks, 5);
    assert!(sim.held.is_empty());
}

#[test]
fn test_terminal_mid_plan_stops_and_releases() {
    let actuator = TimedInputActuator::default();
    let mut sim = ScriptedSimulation {
        terminal_at: Some(3),
        ..ScriptedSimulation::default()
    };

    let outcome = actuator.execute(&mut sim, jump(5));

    assert_eq!(outcome, Actuation { ticks: 3, terminated: true });
    assert_eq!(sim.ticks, 3);
    assert!(sim.held.is_empty());
    for button in [Button::A, Button::Right, Button::B] {
        assert!(sim.releases.contains(&button), "{button:?} released");
    }
}

#[test]
fn test_plan_buttons_pressed_every_tick() {
    let actuator = TimedInputActuator::new(ActuatorConfig {
        sprint: SprintMode::Exclusive,
        ..ActuatorConfig::default()
    });
    let mut sim = ScriptedSimulation::default();

    actuator.execute(&mut sim, ActionPlan::SPRINT);
    actuator.execute(&mut sim, jump(3));

    assert_eq!(
        sim.presses,
        vec![Button::Right, Button::B, Button::A, Button::A, Button::A]
    );
    assert_eq!(sim.releases, vec![Button::Right, Button::B, Button::A]);
}

#[test]
fn test_repeated_press_and_release_is_idempotent() {
    let mut once = flat_level(&[]);
    once.send_input(Button::Right);
    let pressed_once = once.held_buttons();
    once.release_input(Button::Right);

    let mut twice = flat_level(&[]);
    twice.send_input(Button::Right);
    twice.send_input(Button::Right);
    assert_eq!(twice.held_buttons(), pressed_once);
    twice.release_input(Button::Right);
    twice.release_input(Button::Right);

    assert_eq!(twice.held_buttons(), once.held_buttons());
    assert!(twice.held_buttons().is_empty());
}

#[test]
fn test_jump_plan_on_level_leaves_nothing_held() {
    let actuator = TimedInputActuator::default();
    let mut level = flat_level(&[]);

    let outcome = actuator.execute(&mut level, ActionPlan::LONG_JUMP);

    assert_eq!(outcome.ticks, 15);
    assert!(level.held_buttons().is_empty());
    assert_eq!(level.stats().ticks, 15);
    // concurrent sprint carried the jump forward
    assert!(level.agent_position().x > 2);
}
