// Copyright 2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

/*! Where rays turn, reflect and escape.

A ray with parameter `p` travels in a sequence of monotone *legs*. An upward
leg ends either at the depth where `n(z) = p`, where the ray turns over
smoothly, or at the surface, where it is reflected back down. A downward leg
ends at the reflective bottom of the ice if there is one; otherwise the ray
escapes into deep ice and never comes back. Reflection leaves `p` unchanged.

The ways of getting from a source to a receiver are grouped into *families*,
labelled by the launch direction and by the index of the leg on which the
receiver depth is crossed. This module enumerates the families a request can
use, given its reflection budget, and computes the amplitude reflection
coefficients picked up at the boundaries.

*/

use num_complex::Complex64;
use std::f64;
use std::f64::consts::PI;

use crate::medium::MediumProfile;


/// The vertical direction in which a ray is travelling.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn reversed(self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }
}


/// How a leg ends.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Boundary {
    /// The ray turned over smoothly at `n(z) = p`.
    TurningPoint,
    /// The ray was reflected at the ice surface.
    Surface,
    /// The ray was reflected at the bottom of the ice.
    Bottom,
    /// The ray left the bottom of the modelled volume.
    Escape,
}

impl Boundary {
    pub fn is_reflection(self) -> bool {
        self == Boundary::Surface || self == Boundary::Bottom
    }
}


/// One leg of a planned route.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlannedLeg {
    pub direction: Direction,
    pub z_start: f64,
    pub z_end: f64,
    pub end: Boundary,
}

impl PlannedLeg {
    /// Whether depth `z` lies on this leg, up to `slop` metres.
    pub fn spans(&self, z: f64, slop: f64) -> bool {
        let (lo, hi) = if self.z_start < self.z_end {
            (self.z_start, self.z_end)
        } else {
            (self.z_end, self.z_start)
        };

        z >= lo - slop && z <= hi + slop
    }
}


/// A class of routes from a source depth to a receiver depth.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Family {
    /// Which way the ray leaves the source.
    pub launch: Direction,

    /// The index of the leg on which the receiver depth is crossed.
    pub crossing_leg: usize,

    /// Launch zenith angles (radians) that can possibly belong to this
    /// family, as `(low, high)`.
    pub zenith_range: (f64, f64),

    /// Whether the upper ends of the legs must be turning points rather than
    /// surface reflections for the route to fit in the reflection budget.
    pub turning_only: bool,
}

impl Family {
    /// The number of upper ends (turning points or surface reflections) the
    /// route passes before it reaches the crossing leg.
    pub fn tops_before_crossing(&self) -> usize {
        match self.launch {
            Direction::Up => (self.crossing_leg + 1) / 2,
            Direction::Down => self.crossing_leg / 2,
        }
    }

    /// The number of bottom reflections before the crossing leg.
    pub fn bottoms_before_crossing(&self) -> usize {
        match self.launch {
            Direction::Up => self.crossing_leg / 2,
            Direction::Down => (self.crossing_leg + 1) / 2,
        }
    }
}


/// Decides the fate of rays at the boundaries of a medium.
#[derive(Clone, Copy, Debug)]
pub struct ReflectionHandler<'a> {
    medium: &'a MediumProfile,
    max_reflections: usize,
}


impl<'a> ReflectionHandler<'a> {
    pub fn new(medium: &'a MediumProfile, max_reflections: usize) -> Self {
        ReflectionHandler { medium, max_reflections }
    }

    pub fn max_reflections(&self) -> usize {
        self.max_reflections
    }

    /// Where an upward leg with parameter `p` ends.
    pub fn upper_boundary(&self, p: f64) -> (f64, Boundary) {
        match self.medium.turning_depth(p) {
            Some(z) => (z.min(0.), Boundary::TurningPoint),
            None => (0., Boundary::Surface),
        }
    }

    /// Where a downward leg ends.
    pub fn lower_boundary(&self) -> (f64, Boundary) {
        match self.medium.bottom() {
            Some(layer) => (layer.depth, Boundary::Bottom),
            None => (self.medium.depth_range().0, Boundary::Escape),
        }
    }

    /// Lay out the first `n_legs` legs of a ray with parameter `p` leaving
    /// depth `z_start` in direction `launch`. The plan stops early if the ray
    /// escapes.
    pub fn plan(&self, p: f64, z_start: f64, launch: Direction, n_legs: usize) -> Vec<PlannedLeg> {
        let mut legs = Vec::with_capacity(n_legs);
        let mut z = z_start;
        let mut direction = launch;

        while legs.len() < n_legs {
            let (z_end, end) = match direction {
                Direction::Up => self.upper_boundary(p),
                Direction::Down => self.lower_boundary(),
            };

            legs.push(PlannedLeg { direction, z_start: z, z_end, end });

            if end == Boundary::Escape {
                break;
            }

            z = z_end;
            direction = direction.reversed();
        }

        legs
    }

    /// Whether a ray with parameter `p` can exist at depth `z` at all.
    pub fn can_reach(&self, p: f64, z: f64) -> bool {
        p <= self.medium.n_at(z)
    }

    /// Whether a route with these reflection counts fits in the budget.
    pub fn within_budget(&self, surface: usize, bottom: usize) -> bool {
        surface + bottom <= self.max_reflections
    }

    /// Enumerate the families that can connect a source at depth `z_s` to a
    /// receiver at depth `z_r`. Families that need more bottom reflections
    /// than the budget allows are skipped outright. Families that would need
    /// too many surface reflections are restricted to launch angles steep
    /// enough, in `p`, that the ray turns over below the surface instead.
    pub fn families(&self, z_s: f64, z_r: f64) -> Vec<Family> {
        let n_s = self.medium.n_at(z_s);
        let n_r = self.medium.n_at(z_r);
        let theta_max = (n_r / n_s).min(1.).asin();
        let mut families = Vec::new();

        let max_leg = if self.medium.bottom().is_some() { 2 * self.max_reflections + 1 } else { 1 };

        for crossing_leg in 0..=max_leg {
            for &launch in &[Direction::Up, Direction::Down] {
                if crossing_leg == 0 {
                    let heads_that_way = match launch {
                        Direction::Up => z_r > z_s,
                        Direction::Down => z_r < z_s,
                    };

                    if !heads_that_way {
                        continue;
                    }
                }

                // Without a bottom, every downward leg escapes.
                if self.medium.bottom().is_none() && launch == Direction::Down && crossing_leg > 0 {
                    continue;
                }

                let mut family = Family {
                    launch,
                    crossing_leg,
                    zenith_range: (0., theta_max),
                    turning_only: false,
                };

                let tops = family.tops_before_crossing();
                let bottoms = family.bottoms_before_crossing();

                if bottoms > self.max_reflections {
                    continue;
                }

                if tops > 0 && !self.within_budget(tops, bottoms) {
                    let n_surface = self.medium.n_surface();

                    if self.medium.is_uniform() || n_surface >= n_s {
                        continue;
                    }

                    let theta_lo = (n_surface / n_s).asin();

                    if theta_lo >= theta_max {
                        continue;
                    }

                    family.zenith_range.0 = theta_lo;
                    family.turning_only = true;
                }

                if launch == Direction::Down {
                    let (lo, hi) = family.zenith_range;
                    family.zenith_range = (PI - hi, PI - lo);
                }

                families.push(family);
            }
        }

        families
    }

    /// The Fresnel amplitude coefficients `(r_parallel, r_perpendicular)`
    /// for a ray with parameter `p` hitting the surface from below.
    pub fn surface_coefficients(&self, p: f64) -> (Complex64, Complex64) {
        let n_surface = self.medium.n_surface();
        fresnel_coefficients(n_surface, self.medium.n_air(), p / n_surface)
    }

    /// The amplitude coefficient of a bottom reflection, for both
    /// polarisations.
    pub fn bottom_coefficient(&self) -> f64 {
        self.medium.bottom().map(|b| b.coefficient).unwrap_or(0.)
    }
}


/// Fresnel amplitude reflection coefficients `(r_parallel, r_perpendicular)`
/// for a wave in a medium of index `n_1` hitting a medium of index `n_2` at
/// an angle of incidence whose sine is `sin_theta`. Beyond the critical
/// angle the coefficients are complex with unit modulus: the wave is totally
/// reflected and only its phase changes.
pub fn fresnel_coefficients(n_1: f64, n_2: f64, sin_theta: f64) -> (Complex64, Complex64) {
    let n = n_2 / n_1;
    let n2 = n * n;
    let cos_theta = Complex64::new((1. - sin_theta * sin_theta).max(0.).sqrt(), 0.);
    let root = Complex64::new(n2 - sin_theta * sin_theta, 0.).sqrt();

    let r_parallel = (-n2 * cos_theta + root) / (n2 * cos_theta + root);
    let r_perpendicular = (cos_theta - root) / (cos_theta + root);
    (r_parallel, r_perpendicular)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_incidence() {
        let (rp, rs) = fresnel_coefficients(1.353, 1., 0.);
        let expected = (1.353 - 1.) / (1.353 + 1.);
        assert_approx_eq!(rp.re, expected, 1e-12);
        assert_approx_eq!(rs.re, expected, 1e-12);
        assert_eq!(rp.im, 0.);
    }

    #[test]
    fn total_internal_reflection() {
        let critical = 1. / 1.353;

        for i in 1..20 {
            let sin_theta = critical + (1. - critical) * i as f64 / 20.;
            let (rp, rs) = fresnel_coefficients(1.353, 1., sin_theta);
            assert_approx_eq!(rp.norm(), 1., 1e-12);
            assert_approx_eq!(rs.norm(), 1., 1e-12);
        }

        let (rp, rs) = fresnel_coefficients(1.353, 1., 0.5 * critical);
        assert!(rp.norm() < 1.);
        assert!(rs.norm() < 1.);
    }

    #[test]
    fn upper_boundaries() {
        let m = MediumProfile::south_pole_simple();
        let h = ReflectionHandler::new(&m, 1);
        assert_eq!(h.upper_boundary(1.2), (0., Boundary::Surface));

        let (z, end) = h.upper_boundary(1.6);
        assert_eq!(end, Boundary::TurningPoint);
        assert_approx_eq!(m.n_at(z), 1.6, 1e-12);
        assert_eq!(h.lower_boundary(), (-5000., Boundary::Escape));
    }

    #[test]
    fn plans_stop_at_escape() {
        let m = MediumProfile::south_pole_simple();
        let h = ReflectionHandler::new(&m, 1);
        let plan = h.plan(1.2, -200., Direction::Up, 5);
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].end, Boundary::Surface);
        assert_eq!(plan[1].end, Boundary::Escape);
        assert!(plan[1].spans(-300., 0.));
        assert!(!plan[0].spans(-300., 0.));
    }

    #[test]
    fn plans_bounce_off_the_bottom() {
        let m = MediumProfile::moores_bay_simple();
        let h = ReflectionHandler::new(&m, 2);
        let plan = h.plan(1.3, -100., Direction::Down, 3);
        assert_eq!(plan.len(), 3);
        assert_eq!(plan[0], PlannedLeg { direction: Direction::Down, z_start: -100., z_end: -576., end: Boundary::Bottom });
        assert_eq!(plan[1].end, Boundary::Surface);
        assert_eq!(plan[2].direction, Direction::Down);
    }

    #[test]
    fn families_without_bottom() {
        let m = MediumProfile::south_pole_simple();

        // Receiver above the source.
        let fams = ReflectionHandler::new(&m, 1).families(-200., -100.);
        assert_eq!(fams.len(), 2);
        assert!(fams.iter().all(|f| f.launch == Direction::Up));
        assert!(fams.iter().all(|f| !f.turning_only));

        // Receiver below the source.
        let fams = ReflectionHandler::new(&m, 1).families(-100., -200.);
        assert_eq!(fams.len(), 2);
        // The deeper receiver sits in denser ice, so every downward launch
        // down to the horizontal can reach it.
        let down = fams.iter().find(|f| f.launch == Direction::Down && f.crossing_leg == 0).unwrap();
        assert_eq!(down.zenith_range, (0.5 * PI, PI));

        // No reflections allowed: the route over the top must turn.
        let fams = ReflectionHandler::new(&m, 0).families(-200., -100.);
        let over = fams.iter().find(|f| f.crossing_leg == 1).unwrap();
        assert!(over.turning_only);
        assert_approx_eq!(over.zenith_range.0, (1.353 / m.n_at(-200.)).asin(), 1e-12);
    }

    #[test]
    fn families_with_bottom() {
        let m = MediumProfile::moores_bay_simple();
        let fams = ReflectionHandler::new(&m, 1).families(-400., -450.);

        // Legs past the first bottom bounce only fit the budget if every top
        // is a turning point. Down j=3 needs two bottom bounces and is gone.
        assert!(fams.iter().all(|f| f.bottoms_before_crossing() <= 1));
        assert!(fams.iter().any(|f| f.launch == Direction::Down && f.crossing_leg == 1 && !f.turning_only));
        assert!(fams.iter().filter(|f| f.crossing_leg >= 2).all(|f| f.turning_only));
        assert!(!fams.iter().any(|f| f.launch == Direction::Down && f.crossing_leg == 3));
    }

    #[test]
    fn uniform_medium_never_turns() {
        let m = MediumProfile::uniform(1.78).finish().unwrap();
        let h = ReflectionHandler::new(&m, 0);
        assert_eq!(h.upper_boundary(1.7).1, Boundary::Surface);
        assert!(h.families(-200., -100.).iter().all(|f| f.crossing_leg == 0));
    }
}
