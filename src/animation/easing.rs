//! Closed-form, pure easing functions (spec §4.5). Each is monotonic on
//! `[0,1]` with `f(0)=0, f(1)=1`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Easing {
    Linear,
    CubicIn,
    CubicOut,
    CubicInOut,
    ElasticOut,
}

impl Easing {
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::CubicIn => t * t * t,
            Easing::CubicOut => {
                let f = t - 1.0;
                f * f * f + 1.0
            }
            Easing::CubicInOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    let f = 2.0 * t - 2.0;
                    0.5 * f * f * f + 1.0
                }
            }
            Easing::ElasticOut => {
                if t == 0.0 || t == 1.0 {
                    t
                } else {
                    let p = 0.3;
                    let s = p / 4.0;
                    (2.0_f64.powf(-10.0 * t)) * ((t - s) * (2.0 * std::f64::consts::PI) / p).sin() + 1.0
                }
            }
        }
    }
}
