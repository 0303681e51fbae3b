//! Named easing curves.
//!
//! A clip's timing config carries one [`Ease`] per keyframe transition.
//! The scheduler never computes arbitrary curves — it only ever asks an
//! `Ease` to [`Tween::tween`] a linear `0.0..=1.0` progress value, per
//! the "selecting a named easing" boundary in the crate's non-goals.

const PI: f32 = std::f32::consts::PI;

/// Linear interpolation between two values.
///
/// `p` is a percent-complete value, typically itself the output of
/// [`Tween::tween`], used by mutator-style effects (`computeTween`)
/// that don't go through the host's keyframe interpolation at all.
pub fn lerp(start: f32, end: f32, p: f32) -> f32 {
    (1.0 - p) * start + p * end
}

/// Flips a `0.0..=1.0` percentage, `flip(0.25) == 0.75`.
///
/// Used when mirroring a forward easing for a clip whose backward
/// keyframes were not supplied explicitly (§4.1 `setDirection`).
pub fn flip(num: f32) -> f32 {
    1.0 - num
}

/// Anything that can turn a linear progress value into an eased one.
pub trait Tween: std::fmt::Debug + Copy {
    /// `p` is linear percent complete, `0.0..=1.0`. Returns the eased
    /// percent complete, not generally clamped to the same range
    /// (`Back`/`Elastic` overshoot on purpose).
    fn tween(&self, p: f32) -> f32;
}

macro_rules! named_eases {
    ($($curve:ident),* $(,)?) => {
        /// The closed set of easing families a clip's timing config may
        /// select. Authors never implement their own `Ease` variant —
        /// new curves are added here, not via an open trait object.
        #[derive(Debug, Copy, Clone)]
        pub enum Ease {
            $(
                #[allow(missing_docs)]
                $curve($curve),
            )*
        }

        impl Tween for Ease {
            fn tween(&self, p: f32) -> f32 {
                match self {
                    $( Ease::$curve(inner) => inner.tween(p), )*
                }
            }
        }
    };
}

named_eases!(
    Linear, Quadratic, Cubic, Quartic, Quintic, Sinusoidal, Exponential, Circular, Elastic, Back,
    Bounce
);

/// The default easing for most clips: `y = x`.
#[derive(Debug, Copy, Clone)]
pub enum Linear {
    /// The only variant; kept as an enum so `Ease::Linear(Linear::InOut)`
    /// reads the same as every other curve family.
    InOut,
}

impl Tween for Linear {
    fn tween(&self, p: f32) -> f32 {
        p
    }
}

impl From<Linear> for Ease {
    fn from(v: Linear) -> Self {
        Ease::Linear(v)
    }
}

/// `y = x^2` family.
#[derive(Debug, Copy, Clone)]
pub enum Quadratic {
    /// `y = x^2`
    In,
    /// `y = -x^2 + 2x`
    Out,
    /// Piecewise: `(1/2)(2x)^2` then `-(1/2)((2x-1)(2x-3) - 1)`.
    InOut,
}

impl Tween for Quadratic {
    fn tween(&self, p: f32) -> f32 {
        match self {
            Quadratic::In => p.powi(2),
            Quadratic::Out => -(p * (p - 2.)),
            Quadratic::InOut => {
                if p < 0.5 {
                    2. * p.powi(2)
                } else {
                    (-2. * p.powi(2)) + p.mul_add(4., -1.)
                }
            }
        }
    }
}

impl From<Quadratic> for Ease {
    fn from(v: Quadratic) -> Self {
        Ease::Quadratic(v)
    }
}

/// `y = x^3` family.
#[derive(Debug, Copy, Clone)]
pub enum Cubic {
    /// `y = x^3`
    In,
    /// `y = (x-1)^3 + 1`
    Out,
    /// Piecewise cubic through the midpoint.
    InOut,
}

impl Tween for Cubic {
    fn tween(&self, p: f32) -> f32 {
        match self {
            Cubic::In => p.powi(3),
            Cubic::Out => {
                let q = p - 1.;
                q.powi(3) + 1.
            }
            Cubic::InOut => {
                if p < 0.5 {
                    4. * p.powi(3)
                } else {
                    let q = p.mul_add(2., -2.);
                    q.powi(3).mul_add(0.5, 1.)
                }
            }
        }
    }
}

impl From<Cubic> for Ease {
    fn from(v: Cubic) -> Self {
        Ease::Cubic(v)
    }
}

/// `y = x^4` family.
#[derive(Debug, Copy, Clone)]
pub enum Quartic {
    /// `y = x^4`
    In,
    /// `y = 1 - (x-1)^4`
    Out,
    /// Piecewise quartic through the midpoint.
    InOut,
}

impl Tween for Quartic {
    fn tween(&self, p: f32) -> f32 {
        match self {
            Quartic::In => p.powi(4),
            Quartic::Out => {
                let q = p - 1.;
                q.powi(3).mul_add(1. - p, 1.)
            }
            Quartic::InOut => {
                if p < 0.5 {
                    8. * p.powi(4)
                } else {
                    let q = p - 1.;
                    q.powi(4).mul_add(-8., 1.)
                }
            }
        }
    }
}

impl From<Quartic> for Ease {
    fn from(v: Quartic) -> Self {
        Ease::Quartic(v)
    }
}

/// `y = x^5` family.
#[derive(Debug, Copy, Clone)]
pub enum Quintic {
    /// `y = x^5`
    In,
    /// `y = (x-1)^5 + 1`
    Out,
    /// Piecewise quintic through the midpoint.
    InOut,
}

impl Tween for Quintic {
    fn tween(&self, p: f32) -> f32 {
        match self {
            Quintic::In => p.powi(5),
            Quintic::Out => {
                let q = p - 1.;
                q.powi(5) + 1.
            }
            Quintic::InOut => {
                if p < 0.5 {
                    16. * p.powi(5)
                } else {
                    let q = (2. * p) - 2.;
                    q.powi(5).mul_add(0.5, 1.)
                }
            }
        }
    }
}

impl From<Quintic> for Ease {
    fn from(v: Quintic) -> Self {
        Ease::Quintic(v)
    }
}

/// Sine-wave family.
#[derive(Debug, Copy, Clone)]
pub enum Sinusoidal {
    /// `y = 1 - cos((x*PI)/2)`
    In,
    /// `y = sin((x*PI)/2)`
    Out,
    /// `y = -0.5 * (cos(x*PI) - 1)`
    InOut,
}

impl Tween for Sinusoidal {
    fn tween(&self, p: f32) -> f32 {
        match self {
            Sinusoidal::In => 1. - ((p * PI) / 2.).cos(),
            Sinusoidal::Out => ((p * PI) / 2.).sin(),
            Sinusoidal::InOut => -0.5 * ((p * PI).cos() - 1.),
        }
    }
}

impl From<Sinusoidal> for Ease {
    fn from(v: Sinusoidal) -> Self {
        Ease::Sinusoidal(v)
    }
}

/// Exponential family.
#[derive(Debug, Copy, Clone)]
pub enum Exponential {
    /// `y = 2^(10x-10)`, clamped at the boundary.
    In,
    /// `y = 1 - 2^(-10x)`, clamped at the boundary.
    Out,
    /// Piecewise exponential through the midpoint.
    InOut,
}

impl Tween for Exponential {
    fn tween(&self, p: f32) -> f32 {
        match self {
            Exponential::In => {
                if p == 0. {
                    0.
                } else {
                    2_f32.powf(10. * p - 10.)
                }
            }
            Exponential::Out => {
                if p == 1. {
                    1.
                } else {
                    1. - 2_f32.powf(-10. * p)
                }
            }
            Exponential::InOut => {
                if p == 0. {
                    0.
                } else if p == 1. {
                    1.
                } else if p < 0.5 {
                    2_f32.powf(p.mul_add(20., -10.)) * 0.5
                } else {
                    2_f32.powf(p.mul_add(-20., 10.)).mul_add(-0.5, 1.)
                }
            }
        }
    }
}

impl From<Exponential> for Ease {
    fn from(v: Exponential) -> Self {
        Ease::Exponential(v)
    }
}

/// Unit-circle family.
#[derive(Debug, Copy, Clone)]
pub enum Circular {
    /// `y = 1 - sqrt(1 - x^2)`
    In,
    /// `y = sqrt(1 - (x-1)^2)`
    Out,
    /// Piecewise circular through the midpoint.
    InOut,
}

impl Tween for Circular {
    fn tween(&self, p: f32) -> f32 {
        match self {
            Circular::In => 1.0 - (1. - p.powi(2)).sqrt(),
            Circular::Out => ((2. - p) * p).sqrt(),
            Circular::InOut => {
                if p < 0.5 {
                    0.5 * (1. - (1. - (2. * p).powi(2)).sqrt())
                } else {
                    0.5 * ((1. - (-2. * p + 2.).powi(2)).sqrt() + 1.)
                }
            }
        }
    }
}

impl From<Circular> for Ease {
    fn from(v: Circular) -> Self {
        Ease::Circular(v)
    }
}

/// Damped sine-wave family. `In`/`InOut` overshoot past `0.0`/`1.0`.
#[derive(Debug, Copy, Clone)]
pub enum Elastic {
    #[allow(missing_docs)]
    In,
    #[allow(missing_docs)]
    Out,
    #[allow(missing_docs)]
    InOut,
}

impl Tween for Elastic {
    fn tween(&self, p: f32) -> f32 {
        match self {
            Elastic::In => (13. * (PI / 2.) * p).sin() * 2_f32.powf(10. * (p - 1.)),
            Elastic::Out => {
                if p == 1. {
                    1.
                } else {
                    2_f32.powf(-10. * p) * ((10. * p - 0.75) * ((2. * PI) / 3.)).sin() + 1.
                }
            }
            Elastic::InOut => {
                if p < 0.5 {
                    2_f32.powf(10. * (2. * p - 1.) - 1.) * (13. * PI * p).sin()
                } else {
                    0.5 * (2. - 2_f32.powf(-20. * p + 10.) * (13. * PI * p).sin())
                }
            }
        }
    }
}

impl From<Elastic> for Ease {
    fn from(v: Elastic) -> Self {
        Ease::Elastic(v)
    }
}

/// Overshoot-then-settle family.
#[derive(Debug, Copy, Clone)]
pub enum Back {
    #[allow(missing_docs)]
    In,
    #[allow(missing_docs)]
    Out,
    #[allow(missing_docs)]
    InOut,
}

impl Tween for Back {
    fn tween(&self, p: f32) -> f32 {
        match self {
            Back::In => 2.70158 * p.powi(3) - 1.70158 * p.powi(2),
            Back::Out => {
                let q = p - 1.;
                1. + 2.70158 * q.powi(3) + 1.70158 * q.powi(2)
            }
            Back::InOut => {
                let c = 2.5949095;
                if p < 0.5 {
                    let q = 2. * p;
                    q.powi(2) * (0.5 * ((c + 1.) * q - c))
                } else {
                    let q = 2. * p - 2.;
                    0.5 * (q.powi(2) * ((c + 1.) * q + c) + 2.)
                }
            }
        }
    }
}

impl From<Back> for Ease {
    fn from(v: Back) -> Self {
        Ease::Back(v)
    }
}

/// Bounces against the end point.
#[derive(Debug, Copy, Clone)]
pub enum Bounce {
    #[allow(missing_docs)]
    In,
    #[allow(missing_docs)]
    Out,
    #[allow(missing_docs)]
    InOut,
}

impl Bounce {
    fn bounce_in(p: f32) -> f32 {
        1. - Bounce::bounce_out(1. - p)
    }

    fn bounce_out(p: f32) -> f32 {
        if p < 4. / 11. {
            (121. * p.powi(2)) / 16.
        } else if p < 8. / 11. {
            (363. / 40. * p.powi(2)) - 99. / 10. * p + 17. / 5.
        } else if p < 9. / 10. {
            4356. / 361. * p.powi(2) - 35442. / 1805. * p + 16061. / 1805.
        } else {
            54. / 5. * p.powi(2) - 513. / 25. * p + 268. / 25.
        }
    }
}

impl Tween for Bounce {
    fn tween(&self, p: f32) -> f32 {
        match self {
            Bounce::In => Bounce::bounce_in(p),
            Bounce::Out => Bounce::bounce_out(p),
            Bounce::InOut => {
                if p < 0.5 {
                    0.5 * Bounce::bounce_in(p * 2.)
                } else {
                    0.5 + 0.5 * Bounce::bounce_out(p * 2. - 1.)
                }
            }
        }
    }
}

impl From<Bounce> for Ease {
    fn from(v: Bounce) -> Self {
        Ease::Bounce(v)
    }
}

impl Default for Ease {
    fn default() -> Self {
        Ease::Linear(Linear::InOut)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use float_cmp::approx_eq;

    #[test]
    fn linear() {
        for i in 0..=10 {
            let p = i as f32 / 10.0;
            assert_eq!(p, Linear::InOut.tween(p));
        }
    }

    #[test]
    fn quadratic_in() {
        assert!(approx_eq!(f32, 0.00, Quadratic::In.tween(0.0), epsilon = 0.0001));
        assert!(approx_eq!(f32, 0.25, Quadratic::In.tween(0.5), epsilon = 0.0001));
        assert!(approx_eq!(f32, 1.00, Quadratic::In.tween(1.0), epsilon = 0.0001));
    }

    #[test]
    fn quadratic_out() {
        assert!(approx_eq!(f32, 0.00, Quadratic::Out.tween(0.0), epsilon = 0.0001));
        assert!(approx_eq!(f32, 0.75, Quadratic::Out.tween(0.5), epsilon = 0.0001));
        assert!(approx_eq!(f32, 1.00, Quadratic::Out.tween(1.0), epsilon = 0.0001));
    }

    #[test]
    fn quadratic_inout_midpoint() {
        assert!(approx_eq!(f32, 0.50, Quadratic::InOut.tween(0.5), epsilon = 0.0001));
    }

    #[test]
    fn cubic_family() {
        assert!(approx_eq!(f32, 0.125, Cubic::In.tween(0.5), epsilon = 0.0001));
        assert!(approx_eq!(f32, 0.875, Cubic::Out.tween(0.5), epsilon = 0.0001));
        assert!(approx_eq!(f32, 0.500, Cubic::InOut.tween(0.5), epsilon = 0.0001));
    }

    #[test]
    fn back_overshoots() {
        assert!(Back::In.tween(0.4) < 0.0);
        assert!(Back::Out.tween(0.6) > 1.0);
    }

    #[test]
    fn elastic_endpoints_are_exact() {
        assert_eq!(0.0, Elastic::In.tween(0.0));
        assert_eq!(1.0, Elastic::Out.tween(1.0));
        assert_eq!(1.0, Elastic::InOut.tween(1.0));
    }

    #[test]
    fn bounce_endpoints_are_exact() {
        assert!(approx_eq!(f32, 0.0, Bounce::In.tween(0.0), epsilon = 0.0001));
        assert!(approx_eq!(f32, 1.0, Bounce::In.tween(1.0), epsilon = 0.0001));
        assert!(approx_eq!(f32, 0.0, Bounce::Out.tween(0.0), epsilon = 0.0001));
        assert!(approx_eq!(f32, 1.0, Bounce::Out.tween(1.0), epsilon = 0.0001));
    }

    #[test]
    fn exponential_endpoints_are_exact() {
        assert_eq!(0.0, Exponential::In.tween(0.0));
        assert_eq!(1.0, Exponential::Out.tween(1.0));
    }

    #[test]
    fn circular_family() {
        assert!(approx_eq!(f32, 0.0, Circular::In.tween(0.0), epsilon = 0.0001));
        assert!(approx_eq!(f32, 1.0, Circular::In.tween(1.0), epsilon = 0.0001));
        assert!(approx_eq!(f32, 0.5, Circular::InOut.tween(0.5), epsilon = 0.0001));
    }

    #[test]
    fn lerp_and_flip() {
        assert_eq!(5.0, lerp(0.0, 10.0, 0.5));
        assert_eq!(0.75, flip(0.25));
    }

    #[test]
    fn default_ease_is_linear() {
        assert!(matches!(Ease::default(), Ease::Linear(Linear::InOut)));
    }
}
