// Copyright 2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

/*! The analytic ray tracer for exponential firn profiles.

In a medium whose index depends only on depth, the ray parameter
`p = n(z) sin(zenith)` is conserved along a ray, and for the exponential
profile the horizontal distance, path length and travel time between two
depths integrate in closed form (see `MediumProfile::ray_segment`). Finding
the rays that connect a source to a receiver therefore boils down to solving
`X(zenith) = D` for the launch zenith, where `X` is the horizontal distance
at which the ray crosses the receiver depth and `D` the horizontal
separation of the two points.

We do this separately for every route family (see the `reflection` module),
scanning the residual on a fixed grid of launch angles and bisecting every
sign change. In uniform ice everything is a straight line and the launch
angle of each family follows directly from the total vertical distance
travelled.

*/

use num_complex::Complex64;
use slog::Logger;
use std::f64;
use std::f64::consts::PI;

use crate::{PropagationRequest, RayTracer, SPEED_LIGHT};
use crate::error::{RayTracingError, Result};
use crate::medium::MediumProfile;
use crate::numerics::{self, Bracket};
use crate::reflection::{Boundary, Direction, Family, ReflectionHandler};
use crate::solution::{Leg, LegEnd, LegShape, RaySolution, ReflectionCase, SolutionSet, SolutionType};

/// How far off a leg, in metres, the receiver depth may be and still count
/// as being crossed by it.
const CROSSING_SLOP: f64 = 1e-9;

/// Two candidates with the same launch direction are the same ray if their
/// launch zeniths (radians) and path lengths (metres) agree this well.
const DUPLICATE_ZENITH: f64 = 1e-9;
const DUPLICATE_LENGTH: f64 = 1e-6;

/// Ray parameters below this are vertical rays. `sin(PI)` is not zero in
/// floating point.
const VERTICAL_RAY: f64 = 1e-12;


/// The ray parameter of a ray launched at `zenith` from where the index is
/// `n_s`.
fn ray_parameter(n_s: f64, zenith: f64) -> f64 {
    let p = n_s * zenith.sin();

    if p < VERTICAL_RAY {
        0.
    } else {
        p
    }
}


/// Numerical settings of the analytic ray tracer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayTracerConfig {
    n_brackets: usize,
    max_iterations: usize,
    focusing_limit: f64,
    integration_tolerance: f64,
    derivative_step: f64,
}

impl Default for RayTracerConfig {
    fn default() -> Self {
        RayTracerConfig {
            n_brackets: 400,
            max_iterations: 200,
            focusing_limit: 2.,
            integration_tolerance: 1e-6,
            derivative_step: 1e-6,
        }
    }
}

impl RayTracerConfig {
    /// The number of intervals into which each family's range of launch
    /// angles is divided when looking for roots. Two roots closer than one
    /// interval may be missed.
    pub fn n_brackets(mut self, n: usize) -> Self {
        self.n_brackets = n.max(1);
        self
    }

    /// The maximum number of bisection steps spent on one root.
    pub fn max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }

    /// Focusing factors are capped at this value.
    pub fn focusing_limit(mut self, limit: f64) -> Self {
        self.focusing_limit = limit;
        self
    }

    /// Relative tolerance of the attenuation integrals.
    pub fn integration_tolerance(mut self, epsrel: f64) -> Self {
        self.integration_tolerance = epsrel;
        self
    }

    /// Step in launch zenith (radians) used to differentiate the horizontal
    /// distance for the focusing factor.
    pub fn derivative_step(mut self, h: f64) -> Self {
        self.derivative_step = h;
        self
    }
}


/// Everything we know about one ray from the source down to the depth of the
/// receiver.
#[derive(Clone, Debug)]
struct Trace {
    horizontal: f64,
    length: f64,
    time: f64,
    legs: Vec<Leg>,
    surface_reflections: usize,
    bottom_reflections: usize,
    turned: bool,
    turning_point: Option<f64>,
    arrival: Direction,
}


#[derive(Clone, Debug)]
struct Candidate {
    family: Family,
    zenith: f64,
    p: f64,
    trace: Trace,
}


/// The source and receiver of one request, reduced to what the solver needs.
#[derive(Clone, Copy, Debug)]
struct Geometry {
    z_s: f64,
    z_r: f64,
    distance: f64,
    azimuth: f64,
}


/// Traces rays through exponential (or uniform) ice in closed form.
pub struct AnalyticRayTracer {
    medium: MediumProfile,
    config: RayTracerConfig,
    logger: Logger,
}


impl AnalyticRayTracer {
    pub fn new(medium: MediumProfile, logger: Logger) -> Self {
        AnalyticRayTracer::with_config(medium, RayTracerConfig::default(), logger)
    }

    pub fn with_config(medium: MediumProfile, config: RayTracerConfig, logger: Logger) -> Self {
        AnalyticRayTracer { medium, config, logger }
    }

    pub fn config(&self) -> &RayTracerConfig {
        &self.config
    }

    fn check_geometry(&self, request: &PropagationRequest) -> Result<Geometry> {
        let source = request.source();
        let receiver = request.receiver();

        if source.iter().chain(receiver.iter()).any(|c| !c.is_finite()) {
            return Err(RayTracingError::InvalidGeometry("positions must be finite".to_owned()));
        }

        for &(what, z) in &[("source", source[2]), ("receiver", receiver[2])] {
            if z > 0. {
                return Err(RayTracingError::InvalidGeometry(format!(
                    "the {} is above the ice surface (z = {} m)", what, z
                )));
            }

            self.medium.check_depth(z)?;
        }

        let dx = receiver[0] - source[0];
        let dy = receiver[1] - source[1];
        let distance = (dx * dx + dy * dy).sqrt();

        if distance == 0. && source[2] == receiver[2] {
            return Err(RayTracingError::InvalidGeometry("source and receiver coincide".to_owned()));
        }

        request.check_frequencies()?;

        Ok(Geometry {
            z_s: source[2],
            z_r: receiver[2],
            distance,
            azimuth: if distance > 0. { dy.atan2(dx) } else { 0. },
        })
    }

    /// Follow the ray launched at `zenith` in `family` until it crosses the
    /// receiver depth. Returns None if it never does.
    fn trace(&self, handler: &ReflectionHandler, family: &Family, zenith: f64, geom: &Geometry) -> Option<Trace> {
        let n_s = self.medium.n_at(geom.z_s);
        let n_r = self.medium.n_at(geom.z_r);
        let p = ray_parameter(n_s, zenith).min(n_s.min(n_r));
        let j = family.crossing_leg;
        let plan = handler.plan(p, geom.z_s, family.launch, j + 1);

        if plan.len() <= j || !handler.can_reach(p, geom.z_r) {
            return None;
        }

        let shape = if self.medium.is_uniform() { LegShape::Straight } else { LegShape::Curved { p } };
        let mut trace = Trace {
            horizontal: 0.,
            length: 0.,
            time: 0.,
            legs: Vec::with_capacity(j + 1),
            surface_reflections: 0,
            bottom_reflections: 0,
            turned: false,
            turning_point: None,
            arrival: plan[j].direction,
        };

        let push = |trace: &mut Trace, z_start: f64, z_end: f64, end: LegEnd| {
            let seg = self.medium.ray_segment(p, z_start, z_end);
            trace.horizontal += seg.horizontal;
            trace.length += seg.length;
            trace.time += seg.time;
            trace.legs.push(Leg {
                z_start,
                z_end,
                horizontal: seg.horizontal,
                length: seg.length,
                time: seg.time,
                shape,
                end,
            });
        };

        for leg in &plan[..j] {
            match leg.end {
                Boundary::Escape => return None,
                Boundary::Surface => trace.surface_reflections += 1,
                Boundary::Bottom => trace.bottom_reflections += 1,
                Boundary::TurningPoint => {
                    trace.turned = true;
                    trace.turning_point.get_or_insert(leg.z_end);
                },
            }

            push(&mut trace, leg.z_start, leg.z_end, LegEnd::from(leg.end));
        }

        let last = &plan[j];

        if !last.spans(geom.z_r, CROSSING_SLOP) {
            return None;
        }

        push(&mut trace, last.z_start, geom.z_r, LegEnd::Receiver);
        Some(trace)
    }

    fn horizontal_distance(&self, handler: &ReflectionHandler, family: &Family, zenith: f64, geom: &Geometry) -> f64 {
        match self.trace(handler, family, zenith, geom) {
            Some(t) => t.horizontal,
            None => f64::NAN,
        }
    }

    /// Find the launch angles in one family whose rays hit the receiver.
    fn solve_family(&self, handler: &ReflectionHandler, family: &Family, geom: &Geometry,
                    tolerance: f64) -> Vec<f64> {
        let (lo, hi) = family.zenith_range;
        let residual = |zenith: f64| self.horizontal_distance(handler, family, zenith, geom) - geom.distance;

        trace!(self.logger, "scanning route family";
               "launch" => direction_name(family.launch), "crossing_leg" => family.crossing_leg,
               "zenith_lo" => lo, "zenith_hi" => hi, "turning_only" => family.turning_only);

        let mut roots = Vec::new();

        for bracket in numerics::scan_brackets(&residual, lo, hi, self.config.n_brackets, tolerance) {
            match bracket {
                Bracket::Exact(x) => roots.push(x),

                Bracket::SignChange { lo, hi, f_lo, f_hi } => {
                    match numerics::bisect(&residual, lo, hi, f_lo, f_hi, tolerance, self.config.max_iterations) {
                        Ok(root) => {
                            trace!(self.logger, "converged"; "zenith" => root.x, "residual" => root.residual,
                                   "iterations" => root.iterations);
                            roots.push(root.x);
                        },

                        Err(e) => {
                            warn!(self.logger, "discarding candidate ray that did not converge";
                                  "launch" => direction_name(family.launch), "crossing_leg" => family.crossing_leg,
                                  "zenith_lo" => lo, "zenith_hi" => hi, "error" => e.to_string());
                        },
                    }
                },
            }
        }

        roots
    }

    /// In uniform ice each family has exactly one candidate, with
    /// `p = n D / sqrt(D^2 + V^2)` where V is the total vertical distance
    /// travelled.
    fn solve_family_uniform(&self, handler: &ReflectionHandler, family: &Family, geom: &Geometry) -> Vec<f64> {
        let j = family.crossing_leg;
        let plan = handler.plan(0., geom.z_s, family.launch, j + 1);

        if plan.len() <= j || plan[..j].iter().any(|l| l.end == Boundary::Escape) ||
            !plan[j].spans(geom.z_r, CROSSING_SLOP)
        {
            return Vec::new();
        }

        let vertical: f64 = plan[..j].iter().map(|l| (l.z_end - l.z_start).abs()).sum::<f64>() +
            (geom.z_r - plan[j].z_start).abs();

        if vertical == 0. {
            return Vec::new();
        }

        let sin_zenith = geom.distance / geom.distance.hypot(vertical);

        let zenith = match family.launch {
            Direction::Up => sin_zenith.asin(),
            Direction::Down => PI - sin_zenith.asin(),
        };

        if zenith < family.zenith_range.0 || zenith > family.zenith_range.1 {
            return Vec::new();
        }

        vec![zenith]
    }

    /// In uniform ice a source and receiver at the same depth are connected
    /// by a horizontal ray that no route family describes.
    fn horizontal_solution(&self, geom: &Geometry) -> Candidate {
        let n = self.medium.n_at(geom.z_s);
        let time = geom.distance * n / SPEED_LIGHT;

        Candidate {
            family: Family {
                launch: Direction::Up,
                crossing_leg: 0,
                zenith_range: (0.5 * PI, 0.5 * PI),
                turning_only: false,
            },
            zenith: 0.5 * PI,
            p: n,
            trace: Trace {
                horizontal: geom.distance,
                length: geom.distance,
                time,
                legs: vec![Leg {
                    z_start: geom.z_s,
                    z_end: geom.z_r,
                    horizontal: geom.distance,
                    length: geom.distance,
                    time,
                    shape: LegShape::Straight,
                    end: LegEnd::Receiver,
                }],
                surface_reflections: 0,
                bottom_reflections: 0,
                turned: false,
                turning_point: None,
                arrival: Direction::Up,
            },
        }
    }

    /// The focusing factor `sqrt(L / sin(zenith_r) |d zenith / d z_r|)`,
    /// capped, then corrected by `sqrt(n_s / n_r)`.
    fn focusing(&self, handler: &ReflectionHandler, cand: &Candidate, geom: &Geometry) -> f64 {
        if self.medium.is_uniform() {
            return 1.;
        }

        let n_s = self.medium.n_at(geom.z_s);
        let n_r = self.medium.n_at(geom.z_r);
        let p = cand.p;

        if !(p > 0.) {
            info!(self.logger, "vertical ray: no focusing correction"; "zenith" => cand.zenith);
            return 1.;
        }

        let w_r = (n_r * n_r - p * p).max(0.).sqrt();

        let dx_dz = match cand.trace.arrival {
            Direction::Up => p / w_r,
            Direction::Down => -p / w_r,
        };

        let dx_dzenith = numerics::deriv_central(
            |zenith| self.horizontal_distance(handler, &cand.family, zenith, geom),
            cand.zenith,
            self.config.derivative_step,
        ).value;

        let dzenith_dz = -dx_dz / dx_dzenith;

        if !dzenith_dz.is_finite() {
            info!(self.logger, "cannot differentiate the launch angle: no focusing correction";
                  "zenith" => cand.zenith, "dx_dzenith" => dx_dzenith);
            return 1.;
        }

        let f = (cand.trace.length / (p / n_r) * dzenith_dz.abs()).sqrt();
        f.min(self.config.focusing_limit) * (n_s / n_r).sqrt()
    }

    fn build_solution(&self, handler: &ReflectionHandler, cand: Candidate, geom: &Geometry,
                      request: &PropagationRequest) -> Result<RaySolution> {
        let focusing_factor = self.focusing(handler, &cand, geom);
        let (cos_phi, sin_phi) = (geom.azimuth.cos(), geom.azimuth.sin());
        let (sin_zenith, cos_zenith) = (cand.zenith.sin(), cand.zenith.cos());
        let launch_vector = [sin_zenith * cos_phi, sin_zenith * sin_phi, cos_zenith];

        let n_r = self.medium.n_at(geom.z_r);
        let last = cand.trace.legs.last();

        let arrival = if last.map(|l| l.z_start == l.z_end).unwrap_or(false) {
            [cos_phi, sin_phi, 0.]
        } else {
            let sin_r = (cand.p / n_r).min(1.);
            let cos_r = (1. - sin_r * sin_r).sqrt();
            let vz = match cand.trace.arrival {
                Direction::Up => cos_r,
                Direction::Down => -cos_r,
            };
            [sin_r * cos_phi, sin_r * sin_phi, vz]
        };

        let receive_vector = [-arrival[0], -arrival[1], -arrival[2]];

        let (solution_type, reflection_case) =
            if cand.trace.surface_reflections + cand.trace.bottom_reflections > 0 {
                (SolutionType::Reflected, ReflectionCase::from(cand.family.launch))
            } else if cand.trace.turned {
                (SolutionType::Refracted, ReflectionCase::None)
            } else {
                (SolutionType::Direct, ReflectionCase::None)
            };

        let mut r_parallel = Complex64::new(1., 0.);
        let mut r_perpendicular = Complex64::new(1., 0.);

        for leg in &cand.trace.legs {
            match leg.end {
                LegEnd::SurfaceReflection => {
                    let (rp, rs) = handler.surface_coefficients(cand.p);
                    r_parallel *= rp;
                    r_perpendicular *= rs;
                },
                LegEnd::BottomReflection => {
                    let r = handler.bottom_coefficient();
                    r_parallel *= r;
                    r_perpendicular *= r;
                },
                _ => {},
            }
        }

        let mut solution = RaySolution {
            solution_type,
            reflection_case,
            ray_parameter: cand.p,
            launch_vector,
            receive_vector,
            travel_time: cand.trace.time,
            path_length: cand.trace.length,
            attenuation: Vec::with_capacity(request.frequencies_ghz().len()),
            focusing_factor,
            surface_reflections: cand.trace.surface_reflections,
            bottom_reflections: cand.trace.bottom_reflections,
            reflection_coefficients: [r_parallel, r_perpendicular],
            turning_point: cand.trace.turning_point,
            source: request.source(),
            receiver: request.receiver(),
            legs: cand.trace.legs,
        };

        for &f in request.frequencies_ghz() {
            let a = solution.attenuation_along(&self.medium, f, self.config.integration_tolerance)?;
            solution.attenuation.push((f, a));
        }

        debug!(self.logger, "found solution";
               "type" => solution.solution_type.to_string(), "zenith" => cand.zenith,
               "travel_time" => solution.travel_time, "path_length" => solution.path_length,
               "focusing" => solution.focusing_factor);

        Ok(solution)
    }
}


fn direction_name(d: Direction) -> &'static str {
    match d {
        Direction::Up => "up",
        Direction::Down => "down",
    }
}


impl RayTracer for AnalyticRayTracer {
    fn name(&self) -> &'static str {
        "analytic"
    }

    fn medium(&self) -> &MediumProfile {
        &self.medium
    }

    fn find_solutions(&self, request: &PropagationRequest) -> Result<SolutionSet> {
        let geom = self.check_geometry(request)?;
        let handler = ReflectionHandler::new(&self.medium, request.reflection_budget());
        let mut candidates: Vec<Candidate> = Vec::new();

        trace!(self.logger, "beginning analytic ray tracing";
               "z_s" => geom.z_s, "z_r" => geom.z_r, "distance" => geom.distance,
               "max_reflections" => request.reflection_budget());

        if self.medium.is_uniform() && geom.z_s == geom.z_r {
            candidates.push(self.horizontal_solution(&geom));
        }

        for family in handler.families(geom.z_s, geom.z_r) {
            let zeniths = if self.medium.is_uniform() {
                self.solve_family_uniform(&handler, &family, &geom)
            } else {
                self.solve_family(&handler, &family, &geom, request.root_tolerance())
            };

            for zenith in zeniths {
                let trace = match self.trace(&handler, &family, zenith, &geom) {
                    Some(t) => t,
                    None => continue,
                };

                // A receiver sitting exactly on a turning point or boundary is
                // reached by the same ray from two neighbouring families.
                // Distinct routes with the same launch angle (vertical rays)
                // differ in length.
                let duplicate = candidates.iter().any(|c| {
                    c.family.launch == family.launch &&
                        (c.zenith - zenith).abs() < DUPLICATE_ZENITH &&
                        (c.trace.length - trace.length).abs() < DUPLICATE_LENGTH
                });

                if duplicate {
                    continue;
                }

                if !handler.within_budget(trace.surface_reflections, trace.bottom_reflections) {
                    debug!(self.logger, "dropping ray beyond the reflection budget";
                           "zenith" => zenith, "surface" => trace.surface_reflections,
                           "bottom" => trace.bottom_reflections);
                    continue;
                }

                let p = ray_parameter(self.medium.n_at(geom.z_s), zenith);
                candidates.push(Candidate { family, zenith, p, trace });
            }
        }

        let mut solutions = Vec::with_capacity(candidates.len());

        for cand in candidates {
            solutions.push(self.build_solution(&handler, cand, &geom, request)?);
        }

        Ok(SolutionSet::new(solutions))
    }

    fn get_attenuation(&self, solution: &RaySolution, frequency: f64) -> Result<f64> {
        solution.attenuation_along(&self.medium, frequency, self.config.integration_tolerance)
    }
}
