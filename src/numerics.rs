// Copyright 2017-2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

/*! Numerical building blocks: adaptive quadrature, derivatives, root finding.

Quadrature and differentiation come from GSL. The wrappers give them the
builder style we use everywhere else, and turn GSL status codes into
`RayTracingError`s:

```
use firnray::numerics::{IntegrationRule, IntegrationWorkspace};

let mut ws = IntegrationWorkspace::new(100);
let r = ws.qag(|x| x.cos().powi(2), 0., 0.5 * std::f64::consts::PI)
    .tolerance(0., 1e-8)
    .rule(IntegrationRule::GaussKonrod21)
    .compute()
    .unwrap();
assert!((r.value - 0.25 * std::f64::consts::PI).abs() < 1e-8);
```

Root finding is deliberately simple: sample a residual on a fixed grid, keep
every sign change, and bisect each one. This finds all roots that are
separated by more than one grid cell, which is what the ray tracers need.

*/

use rgsl::{self, GaussKronrodRule};
use std::f64;
use std::sync::Once;

use crate::error::{RayTracingError, Result};


static GSL_ERRORS_AS_VALUES: Once = Once::new();

/// GSL aborts on errors unless its handler is switched off. We want the
/// status codes back instead.
fn quiet_gsl() {
    GSL_ERRORS_AS_VALUES.call_once(|| {
        let _ = rgsl::error::set_error_handler_off();
    });
}


#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IntegrationResult {
    pub value: f64,
    pub abserr: f64
}


#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IntegrationRule {
    GaussKonrod15,
    GaussKonrod21,
    GaussKonrod31,
    GaussKonrod41,
    GaussKonrod51,
    GaussKonrod61,
}

impl IntegrationRule {
    fn gsl_key(self) -> GaussKronrodRule {
        match self {
            IntegrationRule::GaussKonrod15 => GaussKronrodRule::Gauss15,
            IntegrationRule::GaussKonrod21 => GaussKronrodRule::Gauss21,
            IntegrationRule::GaussKonrod31 => GaussKronrodRule::Gauss31,
            IntegrationRule::GaussKonrod41 => GaussKronrodRule::Gauss41,
            IntegrationRule::GaussKonrod51 => GaussKronrodRule::Gauss51,
            IntegrationRule::GaussKonrod61 => GaussKronrodRule::Gauss61,
        }
    }
}


/// Scratch space for adaptive integration. The capacity bounds the number of
/// subintervals, and therefore the work done by a single integral.
pub struct IntegrationWorkspace {
    limit: usize,
    handle: Option<rgsl::IntegrationWorkspace>,
}

impl IntegrationWorkspace {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);

        IntegrationWorkspace {
            limit,
            handle: rgsl::IntegrationWorkspace::new(limit),
        }
    }

    pub fn qag<'a, F>(&'a mut self, f: F, lower_bound: f64, upper_bound: f64) -> IntegrationBuilder<'a, F> where F: Fn(f64) -> f64 {
        IntegrationBuilder::new(self, f, lower_bound, upper_bound)
    }
}


pub struct IntegrationBuilder<'a, F: 'a> where F: Fn(f64) -> f64 {
    workspace: &'a mut IntegrationWorkspace,
    function: F,
    rule: IntegrationRule,
    lower_bound: f64,
    upper_bound: f64,
    epsabs: f64,
    epsrel: f64,
}


impl<'a, F: 'a> IntegrationBuilder<'a, F> where F: Fn(f64) -> f64 {
    fn new(ws: &'a mut IntegrationWorkspace, f: F, lower: f64, upper: f64) -> Self {
        IntegrationBuilder {
            workspace: ws,
            function: f,
            rule: IntegrationRule::GaussKonrod21,
            lower_bound: lower,
            upper_bound: upper,
            epsabs: 0.,
            epsrel: 1e-6,
        }
    }

    pub fn tolerance(mut self, epsabs: f64, epsrel: f64) -> Self {
        self.epsabs = epsabs;
        self.epsrel = epsrel;
        self
    }

    pub fn rule(mut self, rule: IntegrationRule) -> Self {
        self.rule = rule;
        self
    }

    /// Run GSL's QAG integrator.
    ///
    /// ## Errors
    ///
    /// `IntegrationFailure` if GSL reports an error (typically that the
    /// subdivision limit was reached before the tolerance was met) or returns
    /// a non-finite value.
    pub fn compute(self) -> Result<IntegrationResult> {
        if self.lower_bound == self.upper_bound {
            return Ok(IntegrationResult { value: 0., abserr: 0. });
        }

        quiet_gsl();

        let limit = self.workspace.limit;
        let handle = match self.workspace.handle.as_mut() {
            Some(h) => h,
            None => return Err(RayTracingError::IntegrationFailure {
                subdivisions: limit,
                reason: "could not allocate an integration workspace".to_owned(),
            }),
        };

        let (value, abserr) = handle.qag(
            self.function,
            self.lower_bound,
            self.upper_bound,
            self.epsabs,
            self.epsrel,
            limit,
            self.rule.gsl_key(),
        ).map_err(|status| RayTracingError::IntegrationFailure {
            subdivisions: limit,
            reason: format!("{:?}", status),
        })?;

        if !value.is_finite() || !abserr.is_finite() {
            return Err(RayTracingError::IntegrationFailure {
                subdivisions: limit,
                reason: format!("non-finite result {} +- {}", value, abserr),
            });
        }

        Ok(IntegrationResult { value, abserr })
    }
}


/// GSL's five-point central difference, with the step re-optimized once from
/// its round-off and truncation error estimates. The result reuses
/// `IntegrationResult`: a value and an absolute error. If GSL reports a
/// failure the value is NaN, so callers only need to check finiteness.
pub fn deriv_central<F>(f: F, x: f64, h: f64) -> IntegrationResult where F: Fn(f64) -> f64 {
    quiet_gsl();

    match rgsl::numerical_differentiation::deriv_central(f, x, h) {
        Ok((value, abserr)) => IntegrationResult { value, abserr },
        Err(_) => IntegrationResult { value: f64::NAN, abserr: f64::INFINITY },
    }
}


/// A place where a sampled function changes sign, or hits zero exactly.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Bracket {
    /// The function is zero, to within the tolerance, at a grid point.
    Exact(f64),

    /// The function changes sign between `lo` and `hi`.
    SignChange {
        lo: f64,
        hi: f64,
        f_lo: f64,
        f_hi: f64,
    },
}


/// Sample `f` at `n + 1` evenly spaced points spanning `[lo, hi]` and report
/// every sign change. Samples with `|f| <= tolerance` are roots in their own
/// right. Non-finite samples are treated as holes in the domain: no bracket
/// is formed across them.
pub fn scan_brackets<F>(mut f: F, lo: f64, hi: f64, n: usize, tolerance: f64) -> Vec<Bracket>
    where F: FnMut(f64) -> f64
{
    let n = n.max(1);
    let xs: Vec<f64> = (0..=n).map(|i| {
        if i == n { hi } else { lo + (hi - lo) * (i as f64) / (n as f64) }
    }).collect();
    let fs: Vec<f64> = xs.iter().map(|&x| f(x)).collect();
    let mut brackets = Vec::new();

    for i in 0..=n {
        if fs[i].abs() <= tolerance {
            brackets.push(Bracket::Exact(xs[i]));
            continue;
        }

        if i < n && fs[i].is_finite() && fs[i + 1].is_finite() && fs[i + 1].abs() > tolerance &&
            (fs[i] < 0.) != (fs[i + 1] < 0.)
        {
            brackets.push(Bracket::SignChange { lo: xs[i], hi: xs[i + 1], f_lo: fs[i], f_hi: fs[i + 1] });
        }
    }

    brackets
}


/// A converged root.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Root {
    pub x: f64,
    pub residual: f64,
    pub iterations: usize,
}


/// Bisect a sign-changing bracket until `|f(x)| <= tolerance`.
///
/// ## Errors
///
/// Returns `ConvergenceFailure` if the tolerance is not met within
/// `max_iterations`, if the bracket collapses to floating-point resolution
/// first, or if `f` returns a non-finite value inside the bracket.
pub fn bisect<F>(mut f: F, lo: f64, hi: f64, f_lo: f64, f_hi: f64, tolerance: f64,
                 max_iterations: usize) -> Result<Root> where F: FnMut(f64) -> f64 {
    if f_lo.abs() <= tolerance {
        return Ok(Root { x: lo, residual: f_lo, iterations: 0 });
    }

    if f_hi.abs() <= tolerance {
        return Ok(Root { x: hi, residual: f_hi, iterations: 0 });
    }

    let mut a = lo;
    let mut b = hi;
    let mut fa = f_lo;
    let mut best = if f_lo.abs() < f_hi.abs() { f_lo } else { f_hi };

    for i in 1..=max_iterations {
        let m = 0.5 * (a + b);

        if m == a || m == b {
            return Err(RayTracingError::ConvergenceFailure { iterations: i, residual: best });
        }

        let fm = f(m);

        if !fm.is_finite() {
            return Err(RayTracingError::ConvergenceFailure { iterations: i, residual: fm });
        }

        if fm.abs() < best.abs() {
            best = fm;
        }

        if fm.abs() <= tolerance {
            return Ok(Root { x: m, residual: fm, iterations: i });
        }

        if (fm < 0.) == (fa < 0.) {
            a = m;
            fa = fm;
        } else {
            b = m;
        }
    }

    Err(RayTracingError::ConvergenceFailure { iterations: max_iterations, residual: best })
}


#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use super::*;

    #[test]
    fn qag_cos_squared() {
        let mut ws = IntegrationWorkspace::new(100);
        let r = ws.qag(|x| x.cos().powi(2), 0., 0.5 * PI)
            .tolerance(0., 1e-10)
            .rule(IntegrationRule::GaussKonrod15)
            .compute()
            .unwrap();
        assert_approx_eq!(r.value, 0.25 * PI, 1e-10);
    }

    /// The inverse square root has an integrable singularity at zero; this
    /// forces many subdivisions toward the left edge.
    #[test]
    fn qag_endpoint_singularity() {
        let mut ws = IntegrationWorkspace::new(1000);
        let r = ws.qag(|x| 1. / x.sqrt(), 0., 1.)
            .tolerance(0., 1e-6)
            .compute()
            .unwrap();
        assert_approx_eq!(r.value, 2., 1e-5);
    }

    #[test]
    fn qag_high_order_rule() {
        let mut ws = IntegrationWorkspace::new(100);
        let r = ws.qag(|x| (-x).exp(), 0., 5.)
            .rule(IntegrationRule::GaussKonrod61)
            .compute()
            .unwrap();
        assert_approx_eq!(r.value, 1. - (-5_f64).exp(), 1e-10);
    }

    #[test]
    fn qag_empty_interval() {
        let mut ws = IntegrationWorkspace::new(10);
        let r = ws.qag(|x| x * x, 2., 2.).compute().unwrap();
        assert_eq!(r.value, 0.);
    }

    #[test]
    fn qag_runs_out_of_room() {
        let mut ws = IntegrationWorkspace::new(2);
        let r = ws.qag(|x| 1. / x.sqrt(), 0., 1.)
            .tolerance(0., 1e-12)
            .compute();

        match r {
            Err(RayTracingError::IntegrationFailure { .. }) => {},
            other => panic!("expected an integration failure, got {:?}", other),
        }
    }

    #[test]
    fn derivative_of_sine() {
        let d = deriv_central(|x| x.sin(), 0.3, 1e-3);
        assert_approx_eq!(d.value, 0.3_f64.cos(), 1e-9);
        assert!(d.abserr < 1e-6);
    }

    #[test]
    fn scan_and_bisect_sine() {
        let brackets = scan_brackets(|x| x.sin(), 0.5, 10., 50, 0.);
        assert_eq!(brackets.len(), 3);

        let roots: Vec<f64> = brackets.iter().map(|b| match *b {
            Bracket::Exact(x) => x,
            Bracket::SignChange { lo, hi, f_lo, f_hi } =>
                bisect(|x| x.sin(), lo, hi, f_lo, f_hi, 1e-12, 200).unwrap().x,
        }).collect();

        assert_approx_eq!(roots[0], PI, 1e-10);
        assert_approx_eq!(roots[1], 2. * PI, 1e-10);
        assert_approx_eq!(roots[2], 3. * PI, 1e-10);
    }

    #[test]
    fn scan_reports_exact_zeros_once() {
        let brackets = scan_brackets(|x| x, -1., 1., 2, 0.);
        assert_eq!(brackets, vec![Bracket::Exact(0.)]);
    }

    /// `sin(PI)` is about 1e-16, not zero, and there is no sign change to
    /// find at the end of the grid.
    #[test]
    fn scan_accepts_near_zero_endpoint() {
        assert!(scan_brackets(|x| x.sin(), 0.5, PI, 10, 0.).is_empty());
        assert_eq!(scan_brackets(|x| x.sin(), 0.5, PI, 10, 1e-9), vec![Bracket::Exact(PI)]);
    }

    #[test]
    fn scan_skips_holes() {
        let brackets = scan_brackets(|x| if x.abs() < 0.3 { f64::NAN } else { x }, -1., 1., 4, 0.);
        assert!(brackets.is_empty());
    }

    #[test]
    fn bisect_sqrt2() {
        let r = bisect(|x| x * x - 2., 0., 2., -2., 2., 1e-12, 200).unwrap();
        assert_approx_eq!(r.x, 2_f64.sqrt(), 1e-12);
    }

    #[test]
    fn bisect_gives_up() {
        let r = bisect(|x| x * x - 2., 0., 2., -2., 2., 1e-12, 3);

        match r {
            Err(RayTracingError::ConvergenceFailure { iterations: 3, .. }) => {},
            other => panic!("expected a convergence failure, got {:?}", other),
        }
    }
}
