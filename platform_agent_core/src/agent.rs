use rand::{SeedableRng, rngs::StdRng, seq::IndexedRandom};

use crate::{
    Position,
    map::SpriteGrid,
    policy::{ActionPlan, Decision, DecisionPolicy},
};

const RANDOM_RULE: &str = "random";

/// Trait defining the behavior of an agent.
/// Agents pick the plan to run for a frame given where the agent stands.
pub trait Agent {
    /// Short label used in logs and the UI.
    fn name(&self) -> &str;

    /// Chooses the plan for this frame.
    /// `&mut self` lets an agent keep state between frames.
    fn choose(&mut self, grid: &SpriteGrid, agent: Position) -> Decision;
}

/// Plays with a fixed rule table.
#[derive(Debug, Clone, Default)]
pub struct ExpertAgent {
    policy: DecisionPolicy,
}

impl ExpertAgent {
    pub fn new(policy: DecisionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &DecisionPolicy {
        &self.policy
    }
}

impl Agent for ExpertAgent {
    fn name(&self) -> &str {
        "expert"
    }

    fn choose(&mut self, grid: &SpriteGrid, agent: Position) -> Decision {
        self.policy.decide_at(grid, agent)
    }
}

/// Baseline that ignores the frame and picks one of the policy's plans at random.
///
/// Its decisions carry the rule name `random`.
#[derive(Debug)]
pub struct RandomAgent {
    plans: Vec<ActionPlan>,
    rng: StdRng,
}

impl RandomAgent {
    pub fn new(policy: &DecisionPolicy, seed: u64) -> Self {
        Self {
            plans: policy.plans(),
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Agent for RandomAgent {
    fn name(&self) -> &str {
        "random"
    }

    fn choose(&mut self, _grid: &SpriteGrid, _agent: Position) -> Decision {
        // plans() always holds at least the default plan
        let plan = self
            .plans
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(ActionPlan::SPRINT);
        Decision {
            rule: Some(RANDOM_RULE.to_string()),
            plan,
        }
    }
}
