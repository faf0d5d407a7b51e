//! Story spring hysteresis.
//!
//! Each story of the shear building is a uniaxial spring relating story
//! deformation (drift) to story shear. The spring keeps a committed state (the
//! last converged step) and a trial state (the current equilibrium iterate).
//! Trial states are always computed from the committed state so that repeated
//! evaluations within one step are path independent.
//!
//! # Rules
//!
//! - **Elastic**: `V = k0 * d`
//! - **Peak-oriented** (Modified-Clough, Pinching): elastic unloading with
//!   `k0` until the shear crosses zero, then reloading toward the largest
//!   previous excursion in the loading direction (initially the yield point).
//!   The reloading branch passes through a pinch point set by `pinch_x` and
//!   `pinch_y`; Modified-Clough uses 0.5 for both.
//! - **Kinematic**: elastic moves with `k0` inside two parallel bounding lines
//!   with the hardening slope, capped at the peak strength.

use mdof_model::{HystereticCurveType, StoryBackbone};

/// Hysteretic rule applied to one story spring
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HystereticRule {
    Elastic,
    /// The pinch point carries `pinch_y` times the target peak shear. Its
    /// deformation is `pinch_x` of the way from the zero crossing to the
    /// point on the elastic unloading line from the peak at that shear.
    PeakOriented { pinch_x: f64, pinch_y: f64 },
    Kinematic,
}

impl HystereticRule {
    pub fn for_curve(curve: HystereticCurveType, pinching: f64) -> Self {
        match curve {
            HystereticCurveType::Elastic => HystereticRule::Elastic,
            HystereticCurveType::ModifiedClough => HystereticRule::PeakOriented {
                pinch_x: 0.5,
                pinch_y: 0.5,
            },
            HystereticCurveType::KinematicHardening => HystereticRule::Kinematic,
            HystereticCurveType::Pinching => HystereticRule::PeakOriented {
                pinch_x: 1.0 - pinching,
                pinch_y: pinching,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct SpringState {
    disp: f64,
    force: f64,
    tangent: f64,
    /// Deformation at the last zero-shear crossing
    zero_disp: f64,
    /// Largest positive excursion (deformation, shear)
    peak_pos: (f64, f64),
    /// Largest negative excursion (deformation, shear)
    peak_neg: (f64, f64),
}

impl SpringState {
    fn virgin(backbone: &StoryBackbone) -> Self {
        Self {
            disp: 0.0,
            force: 0.0,
            tangent: backbone.k0,
            zero_disp: 0.0,
            peak_pos: (backbone.yield_disp, backbone.yield_force),
            peak_neg: (-backbone.yield_disp, -backbone.yield_force),
        }
    }
}

/// Uniaxial story spring with committed and trial states
#[derive(Debug, Clone)]
pub struct StorySpring {
    rule: HystereticRule,
    backbone: StoryBackbone,
    committed: SpringState,
    trial: SpringState,
}

impl StorySpring {
    pub fn new(rule: HystereticRule, backbone: StoryBackbone) -> Self {
        let state = SpringState::virgin(&backbone);
        Self {
            rule,
            backbone,
            committed: state,
            trial: state,
        }
    }

    pub fn rule(&self) -> HystereticRule {
        self.rule
    }

    pub fn backbone(&self) -> &StoryBackbone {
        &self.backbone
    }

    pub fn set_trial_deformation(&mut self, d: f64) {
        self.trial = match self.rule {
            HystereticRule::Elastic => SpringState {
                disp: d,
                force: self.backbone.k0 * d,
                ..self.committed
            },
            HystereticRule::PeakOriented { pinch_x, pinch_y } => {
                self.peak_oriented_trial(d, pinch_x, pinch_y)
            }
            HystereticRule::Kinematic => self.kinematic_trial(d),
        };
    }

    pub fn trial_deformation(&self) -> f64 {
        self.trial.disp
    }

    pub fn trial_force(&self) -> f64 {
        self.trial.force
    }

    pub fn trial_tangent(&self) -> f64 {
        self.trial.tangent
    }

    pub fn initial_tangent(&self) -> f64 {
        self.backbone.k0
    }

    pub fn committed_force(&self) -> f64 {
        self.committed.force
    }

    pub fn commit(&mut self) {
        self.committed = self.trial;
    }

    pub fn revert_to_last_commit(&mut self) {
        self.trial = self.committed;
    }

    pub fn revert_to_start(&mut self) {
        self.committed = SpringState::virgin(&self.backbone);
        self.trial = self.committed;
    }

    fn peak_oriented_trial(&self, d: f64, pinch_x: f64, pinch_y: f64) -> SpringState {
        let c = self.committed;
        let k0 = self.backbone.k0;
        let delta = d - c.disp;
        if delta == 0.0 {
            return c;
        }

        let s = delta.signum();
        let mut next = SpringState { disp: d, ..c };
        let f_elastic = c.force + k0 * delta;

        if s * c.force < 0.0 {
            if s * f_elastic <= 0.0 {
                next.force = f_elastic;
                next.tangent = k0;
                return next;
            }
            next.zero_disp = c.disp - c.force / k0;
        }

        let peak = if s > 0.0 { c.peak_pos } else { c.peak_neg };
        let (f_env, k_env, beyond_peak) =
            self.reload_envelope(d, s, next.zero_disp, peak, pinch_x, pinch_y);

        if s * f_elastic < s * f_env {
            next.force = f_elastic;
            next.tangent = k0;
        } else {
            next.force = f_env;
            next.tangent = k_env;
            if beyond_peak {
                if s > 0.0 {
                    next.peak_pos = (d, f_env);
                } else {
                    next.peak_neg = (d, f_env);
                }
            }
        }
        next
    }

    /// Reloading branch from the zero crossing toward `peak`, continuing on
    /// the backbone past it. Returns (shear, tangent, past the peak).
    fn reload_envelope(
        &self,
        d: f64,
        s: f64,
        zero: f64,
        peak: (f64, f64),
        pinch_x: f64,
        pinch_y: f64,
    ) -> (f64, f64, bool) {
        if s * (d - peak.0) >= 0.0 {
            let (f, k) = self.backbone.evaluate(d);
            return (f, k, true);
        }

        let x = s * (d - zero);
        let x_peak = s * (peak.0 - zero);
        let f_peak = s * peak.1;
        if x <= 0.0 || x_peak <= 0.0 {
            return (0.0, 0.0, false);
        }

        let x_unload = (x_peak - (1.0 - pinch_y) * f_peak / self.backbone.k0).clamp(0.0, x_peak);
        let x_pinch = pinch_x * x_unload;
        let f_pinch = pinch_y * f_peak;
        let (f, k) = if x <= x_pinch && x_pinch > 0.0 {
            (f_pinch * x / x_pinch, f_pinch / x_pinch)
        } else {
            let span = x_peak - x_pinch;
            if span <= 0.0 {
                (f_peak, 0.0)
            } else {
                let slope = (f_peak - f_pinch) / span;
                (f_pinch + slope * (x - x_pinch), slope)
            }
        };
        (s * f, k, false)
    }

    fn kinematic_trial(&self, d: f64) -> SpringState {
        let c = self.committed;
        let f_elastic = c.force + self.backbone.k0 * (d - c.disp);
        let (upper, k_upper) = self.kinematic_bound(d, 1.0);
        let (lower, k_lower) = self.kinematic_bound(d, -1.0);

        let (force, tangent) = if f_elastic >= upper {
            (upper, k_upper)
        } else if f_elastic <= lower {
            (lower, k_lower)
        } else {
            (f_elastic, self.backbone.k0)
        };
        SpringState {
            disp: d,
            force,
            tangent,
            ..c
        }
    }

    fn kinematic_bound(&self, d: f64, s: f64) -> (f64, f64) {
        let bb = &self.backbone;
        let k2 = bb.hardening_stiffness();
        let line = s * bb.yield_force + k2 * (d - s * bb.yield_disp);
        if line.abs() >= bb.peak_force {
            (bb.peak_force.copysign(line), 0.0)
        } else {
            (line, k2)
        }
    }
}
