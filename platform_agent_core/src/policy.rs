use serde::{Deserialize, Serialize};

use crate::{
    Button, ButtonSet, Position,
    locator::{AgentNotFound, locate},
    map::SpriteGrid,
    sensors::{Sensor, SensorWindow},
};

/// Errors raised while assembling a policy. A policy that builds is always
/// able to produce a valid plan.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("Invalid action plan: {reason}")]
    InvalidActionPlan { reason: &'static str },
    #[error("Rule '{rule}' has no sensor checks")]
    EmptyGuard { rule: String },
    #[error("Rule '{rule}' scans a zero-width {sensor:?} window")]
    EmptyWindow { rule: String, sensor: Sensor },
}

/// A timed input command: hold `buttons` for `duration` tick batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "PlanSpec", into = "PlanSpec")]
pub struct ActionPlan {
    duration: u32,
    buttons: ButtonSet,
}

#[derive(Serialize, Deserialize)]
struct PlanSpec {
    duration: u32,
    buttons: ButtonSet,
}

impl TryFrom<PlanSpec> for ActionPlan {
    type Error = PolicyError;

    fn try_from(spec: PlanSpec) -> Result<Self, Self::Error> {
        ActionPlan::new(spec.duration, spec.buttons)
    }
}

impl From<ActionPlan> for PlanSpec {
    fn from(plan: ActionPlan) -> Self {
        PlanSpec {
            duration: plan.duration,
            buttons: plan.buttons,
        }
    }
}

const JUMP: ButtonSet = ButtonSet::of(&[Button::A]);
const SPRINT: ButtonSet = ButtonSet::of(&[Button::Right, Button::B]);

impl ActionPlan {
    pub const TAP_JUMP: ActionPlan = ActionPlan::fixed(1, JUMP);
    pub const SHORT_JUMP: ActionPlan = ActionPlan::fixed(5, JUMP);
    pub const MEDIUM_JUMP: ActionPlan = ActionPlan::fixed(10, JUMP);
    pub const LONG_JUMP: ActionPlan = ActionPlan::fixed(15, JUMP);
    /// Forward plus speed modifier for a single batch.
    pub const SPRINT: ActionPlan = ActionPlan::fixed(1, SPRINT);

    const fn fixed(duration: u32, buttons: ButtonSet) -> Self {
        assert!(duration > 0 && !buttons.is_empty());
        ActionPlan { duration, buttons }
    }

    pub fn new(duration: u32, buttons: ButtonSet) -> Result<Self, PolicyError> {
        if duration == 0 {
            return Err(PolicyError::InvalidActionPlan {
                reason: "duration must be at least one tick batch",
            });
        }
        if buttons.is_empty() {
            return Err(PolicyError::InvalidActionPlan {
                reason: "button set is empty",
            });
        }
        Ok(ActionPlan { duration, buttons })
    }

    #[inline]
    pub fn duration(&self) -> u32 {
        self.duration
    }

    #[inline]
    pub fn buttons(&self) -> ButtonSet {
        self.buttons
    }
}

/// One sensor test inside a rule guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorCheck {
    pub sensor: Sensor,
    pub distance: usize,
    #[serde(default)]
    pub height: usize,
    /// Defaults to 0 for enemy sensors and 1 for terrain sensors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_offset: Option<usize>,
}

impl SensorCheck {
    pub const fn new(sensor: Sensor, distance: usize, height: usize) -> Self {
        Self {
            sensor,
            distance,
            height,
            column_offset: None,
        }
    }

    pub fn window(&self) -> SensorWindow {
        let column_offset = self.column_offset.unwrap_or(match self.sensor {
            Sensor::GroundEnemy | Sensor::FlyingEnemy => 0,
            Sensor::Obstacle | Sensor::Pipe | Sensor::Pit => 1,
        });
        SensorWindow::new(self.distance, self.height, column_offset)
    }

    pub fn detect(&self, grid: &SpriteGrid, agent: Position) -> bool {
        self.sensor.detect(grid, agent, self.window())
    }
}

/// A guarded plan. The guard holds when every check fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    pub when: Vec<SensorCheck>,
    pub plan: ActionPlan,
}

impl Rule {
    pub fn new(name: impl Into<String>, when: Vec<SensorCheck>, plan: ActionPlan) -> Self {
        Self {
            name: name.into(),
            when,
            plan,
        }
    }

    pub fn matches(&self, grid: &SpriteGrid, agent: Position) -> bool {
        self.when.iter().all(|check| check.detect(grid, agent))
    }
}

/// The plan chosen for one frame and the rule that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// `None` when no rule fired and the default plan was used.
    pub rule: Option<String>,
    pub plan: ActionPlan,
}

impl Decision {
    pub fn rule_name(&self) -> &str {
        self.rule.as_deref().unwrap_or("default")
    }
}

/// Ordered rule table evaluated top-down, first match wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecisionPolicy {
    rules: Vec<Rule>,
    default_plan: ActionPlan,
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self {
            rules: standard_rules(),
            default_plan: ActionPlan::SPRINT,
        }
    }
}

/// Built-in rule table, highest priority first.
///
/// Closer and more specific threats come first so they pre-empt the broader
/// checks further down.
pub fn standard_rules() -> Vec<Rule> {
    vec![
        Rule::new(
            "pipe-ahead",
            vec![SensorCheck::new(Sensor::Pipe, 2, 0)],
            ActionPlan::SHORT_JUMP,
        ),
        // sprinting outruns fighter flies
        Rule::new(
            "flying-enemy-ahead",
            vec![SensorCheck::new(Sensor::FlyingEnemy, 6, 4)],
            ActionPlan::SPRINT,
        ),
        Rule::new(
            "ground-enemy-close",
            vec![SensorCheck::new(Sensor::GroundEnemy, 3, 1)],
            ActionPlan::TAP_JUMP,
        ),
        Rule::new(
            "enemy-behind-obstacle",
            vec![
                SensorCheck::new(Sensor::GroundEnemy, 6, 2),
                SensorCheck::new(Sensor::Obstacle, 4, 0),
            ],
            ActionPlan::LONG_JUMP,
        ),
        Rule::new(
            "pit-ahead",
            vec![SensorCheck::new(Sensor::Pit, 3, 0)],
            ActionPlan::TAP_JUMP,
        ),
        Rule::new(
            "obstacle-ahead",
            vec![SensorCheck::new(Sensor::Obstacle, 2, 0)],
            ActionPlan::MEDIUM_JUMP,
        ),
    ]
}

impl DecisionPolicy {
    /// Builds a policy from an ordered rule list, rejecting rules that could
    /// never fire.
    pub fn new(rules: Vec<Rule>, default_plan: ActionPlan) -> Result<Self, PolicyError> {
        for rule in &rules {
            if rule.when.is_empty() {
                return Err(PolicyError::EmptyGuard {
                    rule: rule.name.clone(),
                });
            }
            if let Some(check) = rule.when.iter().find(|c| c.distance <= c.window().column_offset) {
                return Err(PolicyError::EmptyWindow {
                    rule: rule.name.clone(),
                    sensor: check.sensor,
                });
            }
        }
        Ok(Self {
            rules,
            default_plan,
        })
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn default_plan(&self) -> ActionPlan {
        self.default_plan
    }

    /// Locates the agent and returns the plan for this frame.
    pub fn decide(&self, grid: &SpriteGrid) -> Result<ActionPlan, AgentNotFound> {
        let agent = locate(grid)?;
        Ok(self.decide_at(grid, agent).plan)
    }

    /// Evaluates the rules against a known agent position.
    pub fn decide_at(&self, grid: &SpriteGrid, agent: Position) -> Decision {
        match self.rules.iter().find(|rule| rule.matches(grid, agent)) {
            Some(rule) => Decision {
                rule: Some(rule.name.clone()),
                plan: rule.plan,
            },
            None => Decision {
                rule: None,
                plan: self.default_plan,
            },
        }
    }

    /// Every distinct plan the policy can emit, default last.
    pub fn plans(&self) -> Vec<ActionPlan> {
        let mut plans: Vec<ActionPlan> = Vec::with_capacity(self.rules.len() + 1);
        for plan in self.rules.iter().map(|r| r.plan).chain([self.default_plan]) {
            if !plans.contains(&plan) {
                plans.push(plan);
            }
        }
        plans
    }
}
