use tracing::warn;

use crate::{Position, Sprite, map::SpriteGrid};

/// The agent sprite does not appear anywhere in the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Agent sprite not found in {width}x{height} grid")]
pub struct AgentNotFound {
    pub width: usize,
    pub height: usize,
}

/// Finds the first agent cell scanning rows top to bottom, columns left to right.
pub fn locate(grid: &SpriteGrid) -> Result<Position, AgentNotFound> {
    grid.enumerate()
        .find_map(|((x, y), sprite)| (*sprite == Sprite::Agent).then_some(Position { x, y }))
        .ok_or(AgentNotFound {
            width: grid.width(),
            height: grid.height(),
        })
}

/// Locator that remembers where the agent was last seen.
///
/// Frames where the agent sprite flickers out (invincibility blinking, dying
/// animation) resolve to the last known cell instead of failing.
#[derive(Debug, Clone, Default)]
pub struct AgentLocator {
    last_known: Option<Position>,
}

impl AgentLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_known(&self) -> Option<Position> {
        self.last_known
    }

    /// Locates the agent, falling back to the last known position.
    pub fn locate_or_last(&mut self, grid: &SpriteGrid) -> Result<Position, AgentNotFound> {
        match locate(grid) {
            Ok(position) => {
                self.last_known = Some(position);
                Ok(position)
            }
            Err(err) => match self.last_known {
                Some(position) => {
                    warn!(x = position.x, y = position.y, "Agent not visible, using last known position");
                    Ok(position)
                }
                None => Err(err),
            },
        }
    }

    /// Forgets the retained position, e.g. when a new episode starts.
    pub fn clear(&mut self) {
        self.last_known = None;
    }
}
