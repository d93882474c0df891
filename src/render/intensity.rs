/// A level that rises quickly on activity and falls back slowly without it.
///
/// Used for beat pulses (`step`) and for peak-hold markers (`follow`).
#[derive(Clone, Debug)]
pub struct DecayingIntensity {
    value: f32,
    attack: f32,
    decay: f32,
    held: u32,
}

impl DecayingIntensity {
    pub fn new(attack: f32, decay: f32) -> Self {
        Self {
            value: 0.0,
            attack,
            decay,
            held: 0,
        }
    }

    /// Beat pulse in 0.0-1.0, the way every preset drives it.
    pub fn beat_pulse() -> Self {
        Self::new(0.3, 0.05)
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn reset(&mut self) {
        self.value = 0.0;
        self.held = 0;
    }

    /// Rise by `attack * attack_scale` while `active`, otherwise fall by
    /// `decay * decay_scale`. Stays within 0.0-1.0.
    pub fn step(&mut self, active: bool, attack_scale: f32, decay_scale: f32) -> f32 {
        self.value = if active {
            (self.value + self.attack * attack_scale).min(1.0)
        } else {
            (self.value - self.decay * decay_scale).max(0.0)
        };
        self.value
    }

    /// Peak hold: jump to `level` when it exceeds the held value, keep it for
    /// `hold_frames` calls, then fall by `decay * decay_scale` per call.
    pub fn follow(&mut self, level: f32, hold_frames: f32, decay_scale: f32) -> f32 {
        if level > self.value {
            self.value = level;
            self.held = 0;
        } else {
            self.held = self.held.saturating_add(1);
            if self.held as f32 > hold_frames {
                self.value = (self.value - self.decay * decay_scale).max(0.0);
            }
        }
        self.value
    }
}

/// Free-running phase for idle wobble and rotation.
#[derive(Clone, Debug, Default)]
pub struct AnimationPhase(f32);

impl AnimationPhase {
    pub fn advance(&mut self, playing: bool, sensitivity: f32) -> f32 {
        self.0 += if playing { 0.02 } else { 0.005 } * sensitivity;
        self.0
    }

    pub fn value(&self) -> f32 {
        self.0
    }
}
