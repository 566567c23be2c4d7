use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    Position,
    actuator::{Actuation, Simulation, TimedInputActuator},
    agent::Agent,
    config::DriverConfig,
    locator::AgentLocator,
    map::SpriteGrid,
    policy::Decision,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DriverError {
    #[error("Agent missing for {frames} consecutive frames")]
    AgentLost { frames: u32 },
}

/// Result of one decision cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cycle {
    Acted {
        position: Position,
        decision: Decision,
        actuation: Actuation,
    },
    /// No agent in the frame and none seen before; one tick passed without input.
    AgentMissing { frames: u32 },
    /// The episode had already ended; nothing was sampled.
    Terminal,
}

/// Summary of a finished episode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EpisodeReport {
    pub cycles: u64,
    pub ticks: u64,
    /// False when the cycle limit was hit first.
    pub terminal: bool,
    /// How often each rule fired, `default` for the fallback plan.
    pub rule_hits: BTreeMap<String, u64>,
}

/// Runs the snapshot, decide, act cycle against a simulation.
pub struct AgentLoop<S: Simulation> {
    simulation: S,
    agent: Box<dyn Agent>,
    actuator: TimedInputActuator,
    locator: AgentLocator,
    config: DriverConfig,
    missing_frames: u32,
}

impl<S: Simulation> AgentLoop<S> {
    pub fn new(
        simulation: S,
        agent: Box<dyn Agent>,
        actuator: TimedInputActuator,
        config: DriverConfig,
    ) -> Self {
        Self {
            simulation,
            agent,
            actuator,
            locator: AgentLocator::new(),
            config,
            missing_frames: 0,
        }
    }

    pub fn simulation(&self) -> &S {
        &self.simulation
    }

    pub fn simulation_mut(&mut self) -> &mut S {
        &mut self.simulation
    }

    pub fn agent_name(&self) -> &str {
        self.agent.name()
    }

    /// Decides on a plan for `grid` and executes it to completion.
    pub fn decide_and_act(&mut self, grid: &SpriteGrid) -> Result<Cycle, DriverError> {
        let position = match self.locator.locate_or_last(grid) {
            Ok(position) => position,
            Err(err) => {
                self.missing_frames += 1;
                let frames = self.missing_frames;
                warn!(%err, frames, "Skipping frame");
                if frames >= self.config.max_missing_frames {
                    return Err(DriverError::AgentLost { frames });
                }
                self.simulation.advance_tick();
                return Ok(Cycle::AgentMissing { frames });
            }
        };
        self.missing_frames = 0;

        let decision = self.agent.choose(grid, position);
        debug!(
            rule = decision.rule_name(),
            x = position.x,
            y = position.y,
            duration = decision.plan.duration(),
            "Decided"
        );
        let actuation = self.actuator.execute(&mut self.simulation, decision.plan);
        Ok(Cycle::Acted {
            position,
            decision,
            actuation,
        })
    }

    /// Samples the simulation and runs one cycle.
    pub fn step(&mut self) -> Result<Cycle, DriverError> {
        if self.simulation.is_terminal() {
            return Ok(Cycle::Terminal);
        }
        let grid = self.simulation.grid_snapshot();
        self.decide_and_act(&grid)
    }

    /// Starts a fresh episode without running it.
    pub fn reset(&mut self) {
        self.simulation.reset();
        self.locator.clear();
        self.missing_frames = 0;
    }

    /// Resets the simulation and plays until it ends or the cycle limit is hit.
    pub fn run_episode(&mut self) -> Result<EpisodeReport, DriverError> {
        self.reset();
        let mut report = EpisodeReport::default();

        while report.cycles < self.config.max_cycles {
            match self.step()? {
                Cycle::Terminal => break,
                Cycle::Acted {
                    decision,
                    actuation,
                    ..
                } => {
                    report.ticks += u64::from(actuation.ticks);
                    *report
                        .rule_hits
                        .entry(decision.rule_name().to_string())
                        .or_default() += 1;
                }
                Cycle::AgentMissing { .. } => report.ticks += 1,
            }
            report.cycles += 1;
        }
        report.terminal = self.simulation.is_terminal();

        info!(
            agent = self.agent.name(),
            cycles = report.cycles,
            ticks = report.ticks,
            terminal = report.terminal,
            "Episode complete"
        );
        Ok(report)
    }
}
