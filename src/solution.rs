// Copyright 2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

/*! Ray-tracing solutions and the things you can compute from them.

*/

use num_complex::Complex64;
use std::cmp::Ordering;
use std::f64;
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

use crate::error::{RayTracingError, Result};
use crate::medium::MediumProfile;
use crate::numerics::IntegrationWorkspace;
use crate::reflection::{Boundary, Direction};


/// How a ray got from the source to the receiver.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum SolutionType {
    /// Straight to the receiver without turning over or reflecting.
    Direct,

    /// Turned over at least once before reaching the receiver, without
    /// reflecting.
    Refracted,

    /// Reflected at the surface or at the bottom of the ice at least once.
    Reflected,
}

impl fmt::Display for SolutionType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            SolutionType::Direct => write!(f, "direct"),
            SolutionType::Refracted => write!(f, "refracted"),
            SolutionType::Reflected => write!(f, "reflected"),
        }
    }
}

impl FromStr for SolutionType {
    type Err = RayTracingError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "direct" => Ok(SolutionType::Direct),
            "refracted" => Ok(SolutionType::Refracted),
            "reflected" => Ok(SolutionType::Reflected),
            other => Err(RayTracingError::Configuration(format!("unknown solution type \"{}\"", other))),
        }
    }
}


/// For reflected rays, which way they were launched.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ReflectionCase {
    /// The ray was not reflected.
    None,

    /// Launched upward, toward the surface.
    Upward,

    /// Launched downward, toward the bottom of the ice.
    Downward,
}

impl From<Direction> for ReflectionCase {
    fn from(d: Direction) -> Self {
        match d {
            Direction::Up => ReflectionCase::Upward,
            Direction::Down => ReflectionCase::Downward,
        }
    }
}


/// How a leg of a solution ends.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum LegEnd {
    TurningPoint,
    SurfaceReflection,
    BottomReflection,
    Receiver,
}

impl From<Boundary> for LegEnd {
    fn from(b: Boundary) -> Self {
        match b {
            Boundary::TurningPoint => LegEnd::TurningPoint,
            Boundary::Surface => LegEnd::SurfaceReflection,
            Boundary::Bottom => LegEnd::BottomReflection,
            // An escaping leg never makes it into a solution; if it did, it
            // would have to end at the receiver.
            Boundary::Escape => LegEnd::Receiver,
        }
    }
}


/// The shape of a leg.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LegShape {
    /// Bent by the index gradient, with ray parameter `p`.
    Curved { p: f64 },

    /// A straight line.
    Straight,
}


/// A monotone-in-depth piece of a ray path.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Leg {
    pub z_start: f64,
    pub z_end: f64,
    /// Horizontal distance covered, in metres.
    pub horizontal: f64,
    pub length: f64,
    pub time: f64,
    pub shape: LegShape,
    pub end: LegEnd,
}


impl Leg {
    /// The horizontal distance from the start of the leg at which the ray
    /// reaches depth `z`, which must lie on the leg.
    fn horizontal_at(&self, medium: &MediumProfile, z: f64) -> f64 {
        match self.shape {
            LegShape::Curved { p } => medium.ray_segment(p, self.z_start, z).horizontal,
            LegShape::Straight => {
                let dz = self.z_end - self.z_start;

                if dz == 0. {
                    0.
                } else {
                    self.horizontal * (z - self.z_start) / dz
                }
            },
        }
    }

    /// The optical depth `∫ ds / L(z, f)` of this leg.
    fn optical_depth(&self, medium: &MediumProfile, frequency: f64, epsrel: f64,
                     ws: &mut IntegrationWorkspace) -> Result<f64> {
        let model = medium.attenuation_model();
        let inverse_length = |z: f64| {
            if z > 0. {
                0.
            } else {
                1. / model.attenuation_length(z, frequency)
            }
        };

        if self.length == 0. {
            return Ok(0.);
        }

        let top = self.z_start.max(self.z_end);
        let bottom = self.z_start.min(self.z_end);

        if top == bottom {
            return Ok(self.length * inverse_length(top));
        }

        match self.shape {
            LegShape::Straight => {
                let ds_dz = self.length / (top - bottom);
                Ok(ds_dz * ws.qag(inverse_length, bottom, top).tolerance(0., epsrel).compute()?.value)
            },

            LegShape::Curved { p } => {
                // z = top - u^2 takes the square-root singularity out of
                // ds/dz at a turning point.
                let integrand = |u: f64| {
                    let z = top - u * u;
                    let n = medium.n_at(z);
                    let w2 = n * n - p * p;

                    if w2 <= 0. {
                        0.
                    } else {
                        2. * u * n / w2.sqrt() * inverse_length(z)
                    }
                };

                Ok(ws.qag(integrand, 0., (top - bottom).sqrt()).tolerance(0., epsrel).compute()?.value)
            },
        }
    }
}


/// One way of getting from a source to a receiver.
#[derive(Clone, Debug, PartialEq)]
pub struct RaySolution {
    pub solution_type: SolutionType,
    pub reflection_case: ReflectionCase,

    /// The conserved ray parameter `n(z) sin(zenith)`.
    pub ray_parameter: f64,

    /// Unit propagation direction at the source.
    pub launch_vector: [f64; 3],

    /// Unit vector at the receiver pointing back along the incoming ray.
    pub receive_vector: [f64; 3],

    /// Nanoseconds.
    pub travel_time: f64,

    /// Metres.
    pub path_length: f64,

    /// `(frequency, amplitude attenuation factor)` pairs for the frequencies
    /// of the request.
    pub attenuation: Vec<(f64, f64)>,

    pub focusing_factor: f64,
    pub surface_reflections: usize,
    pub bottom_reflections: usize,

    /// Product of the amplitude reflection coefficients picked up along the
    /// way, as `[parallel (theta), perpendicular (phi)]`. Both are 1 for a
    /// ray that is never reflected.
    pub reflection_coefficients: [Complex64; 2],

    /// Depth of the first turning point, if the ray turns over.
    pub turning_point: Option<f64>,

    pub source: [f64; 3],
    pub receiver: [f64; 3],
    pub legs: Vec<Leg>,
}


impl RaySolution {
    /// Launch zenith angle, in radians.
    pub fn launch_zenith(&self) -> f64 {
        self.launch_vector[2].max(-1.).min(1.).acos()
    }

    /// Launch azimuth, in radians.
    pub fn launch_azimuth(&self) -> f64 {
        self.launch_vector[1].atan2(self.launch_vector[0])
    }

    /// Zenith angle of the receive vector, in radians.
    pub fn receive_zenith(&self) -> f64 {
        self.receive_vector[2].max(-1.).min(1.).acos()
    }

    /// Look up the attenuation factor computed for one of the frequencies of
    /// the request.
    pub fn tabulated_attenuation(&self, frequency: f64) -> Option<f64> {
        self.attenuation.iter().find(|&&(f, _)| f == frequency).map(|&(_, a)| a)
    }

    /// The amplitude attenuation factor `exp(-∫ ds / L)` along this path at
    /// `frequency` (GHz).
    ///
    /// ## Errors
    ///
    /// Negative or non-finite frequencies give `OutOfDomain`; the numerical
    /// integration can fail with `IntegrationFailure`.
    pub fn attenuation_along(&self, medium: &MediumProfile, frequency: f64, epsrel: f64) -> Result<f64> {
        if frequency == 0. {
            return Ok(1.);
        }

        if !(frequency > 0.) || !frequency.is_finite() {
            return Err(RayTracingError::out_of_domain("frequency", frequency, 0., f64::INFINITY));
        }

        let model = medium.attenuation_model();

        if model.is_none() {
            return Ok(1.);
        }

        let in_ice = self.legs.iter().all(|l| l.z_start <= 0. && l.z_end <= 0.);

        if model.is_depth_independent() && in_ice {
            let l = medium.attenuation_length(self.receiver[2], frequency)?;
            return Ok((-self.path_length / l).exp());
        }

        let mut ws = IntegrationWorkspace::new(1000);
        let mut tau = 0.;

        for leg in &self.legs {
            tau += leg.optical_depth(medium, frequency, epsrel, &mut ws)?;
        }

        Ok((-tau).exp())
    }

    /// Sample `n_points` positions along the path, from the source to the
    /// receiver. Each leg gets a share of the points in proportion to its
    /// length. Within a straight leg they are evenly spaced along the line;
    /// within a curved leg they are evenly spaced in depth, so they bunch up
    /// horizontally near a turning point.
    pub fn sample_path(&self, medium: &MediumProfile, n_points: usize) -> Vec<[f64; 3]> {
        if n_points == 0 {
            return Vec::new();
        }

        if n_points == 1 {
            return vec![self.source];
        }

        let dx = self.receiver[0] - self.source[0];
        let dy = self.receiver[1] - self.source[1];
        let distance = (dx * dx + dy * dy).sqrt();
        let (cos_phi, sin_phi) = if distance > 0. { (dx / distance, dy / distance) } else { (1., 0.) };

        let total: f64 = self.legs.iter().map(|l| l.length).sum();
        let mut points = Vec::with_capacity(n_points);
        let mut leg_index = 0;
        let mut s_at_leg = 0.;
        let mut x_at_leg = 0.;

        for i in 0..n_points {
            let s = total * i as f64 / (n_points - 1) as f64;

            while leg_index + 1 < self.legs.len() && s > s_at_leg + self.legs[leg_index].length {
                s_at_leg += self.legs[leg_index].length;
                x_at_leg += self.legs[leg_index].horizontal;
                leg_index += 1;
            }

            let (x, z) = match self.legs.get(leg_index) {
                None => (0., self.source[2]),
                Some(leg) => {
                    let t = if leg.length > 0. { ((s - s_at_leg) / leg.length).max(0.).min(1.) } else { 1. };

                    match leg.shape {
                        LegShape::Straight => (x_at_leg + t * leg.horizontal, leg.z_start + t * (leg.z_end - leg.z_start)),
                        LegShape::Curved { .. } => {
                            let z = leg.z_start + t * (leg.z_end - leg.z_start);
                            (x_at_leg + leg.horizontal_at(medium, z), z)
                        },
                    }
                },
            };

            points.push([self.source[0] + x * cos_phi, self.source[1] + x * sin_phi, z]);
        }

        points
    }
}


/// All the solutions for one request, ordered by solution type (direct
/// first), then by travel time, then by launch zenith.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SolutionSet(Vec<RaySolution>);


impl SolutionSet {
    pub fn new(mut solutions: Vec<RaySolution>) -> Self {
        solutions.sort_by(|a, b| {
            a.solution_type.cmp(&b.solution_type)
                .then(a.travel_time.partial_cmp(&b.travel_time).unwrap_or(Ordering::Equal))
                .then(a.launch_zenith().partial_cmp(&b.launch_zenith()).unwrap_or(Ordering::Equal))
        });

        SolutionSet(solutions)
    }

    /// The difference in arrival time `t_j - t_i`, in ns, between two
    /// solutions.
    pub fn time_delay(&self, i: usize, j: usize) -> Option<f64> {
        Some(self.0.get(j)?.travel_time - self.0.get(i)?.travel_time)
    }

    pub fn into_vec(self) -> Vec<RaySolution> {
        self.0
    }
}

impl Deref for SolutionSet {
    type Target = [RaySolution];

    fn deref(&self) -> &[RaySolution] {
        &self.0
    }
}

impl IntoIterator for SolutionSet {
    type Item = RaySolution;
    type IntoIter = std::vec::IntoIter<RaySolution>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a SolutionSet {
    type Item = &'a RaySolution;
    type IntoIter = std::slice::Iter<'a, RaySolution>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
