//! Vehicle motion arithmetic
//!
//! Pure helpers for one vehicle tick: folding the relevant lights' colors
//! into a decision, then applying the clamped advance. Kept free of any
//! async state so the braking and clamping rules can be tested directly.

use crate::domain::types::TrafficLightColor;

/// Result of applying one advancing tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// Position after the tick, never beyond the track end
    pub position: u32,
    /// Speed to report for this tick (0 on arrival)
    pub speed: u32,
    /// The vehicle reached the end of the track on this tick
    pub arrived: bool,
}

/// Speed for this tick: half of base speed (integer division) when a yellow
/// light is relevant.
#[inline]
pub fn tick_speed(base_speed: u32, slow: bool) -> u32 {
    if slow {
        base_speed / 2
    } else {
        base_speed
    }
}

/// Advance `position` by the tick speed, clamped to `track_length`.
///
/// Arriving at the track end always reports zero speed.
pub fn advance(position: u32, base_speed: u32, slow: bool, track_length: u32) -> Step {
    let speed = tick_speed(base_speed, slow);
    let next = position.saturating_add(speed).min(track_length);
    let arrived = next >= track_length;
    Step { position: next, speed: if arrived { 0 } else { speed }, arrived }
}

/// Light evaluation state accumulated over one tick
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickPlan {
    /// A red light was seen; the vehicle does not move this tick
    pub blocked: bool,
    /// A yellow light was seen; the advance uses half speed
    pub slow: bool,
}

impl TickPlan {
    /// Fold in one relevant light. Returns true if the vehicle has to wait
    /// for this light to leave red.
    pub fn observe(&mut self, color: TrafficLightColor) -> bool {
        match color {
            TrafficLightColor::Red => {
                self.blocked = true;
                true
            }
            TrafficLightColor::Yellow => {
                self.slow = true;
                false
            }
            TrafficLightColor::Green => false,
        }
    }

    /// The step to take, or `None` for a blocked tick
    pub fn apply(&self, position: u32, base_speed: u32, track_length: u32) -> Option<Step> {
        if self.blocked {
            None
        } else {
            Some(advance(position, base_speed, self.slow, track_length))
        }
    }
}

/// Decide one tick from the colors of the relevant lights (ascending position)
pub fn plan_move<I>(position: u32, base_speed: u32, track_length: u32, colors: I) -> Option<Step>
where
    I: IntoIterator<Item = TrafficLightColor>,
{
    let mut plan = TickPlan::default();
    for color in colors {
        plan.observe(color);
    }
    plan.apply(position, base_speed, track_length)
}
