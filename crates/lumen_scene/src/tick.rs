/// Passed to every fixed-step hook.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FixedTickContext {
    pub fixed_delta_seconds: f64,
    pub fixed_tick_index: u64,
}

/// Passed to the per-frame update and late-update hooks.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameTickContext {
    pub delta_seconds: f64,
    pub unscaled_delta_seconds: f64,
    pub frame_index: u64,
}

impl FrameTickContext {
    /// `delta_seconds` narrowed for glam math.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn delta_f32(&self) -> f32 {
        self.delta_seconds as f32
    }
}
