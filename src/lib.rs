/*! Trace radio rays through polar ice.

Radio detectors for ultra-high-energy neutrinos bury antennas in the ice
sheets of Antarctica and Greenland. To simulate or reconstruct an event one
needs to know every path along which a signal emitted at an interaction
vertex can reach an antenna, and what happens to the signal on the way. This
crate answers that question for the standard model of polar ice: an index of
refraction that rises exponentially with depth through the firn,

```text
n(z) = n_ice - delta_n * exp(z / z_0)      (z <= 0 in the ice)
```

so that rays curve downward, can turn over below the surface, and leave
*shadow zones* that no ray from a given source reaches.

For each source/receiver pair we find all the rays that connect them,
classify each as *direct*, *refracted* (turned over before arriving) or
*reflected* (bounced off the surface or off the bottom of an ice shelf), and
compute its travel time, path length, frequency-dependent attenuation,
launch and receive directions, focusing factor and reflection coefficients.

Units: metres, nanoseconds, GHz and radians throughout. The ice surface is
at `z = 0` and the ice lies at negative `z`.

```
use firnray::{MediumProfile, PropagationRequest, RayTracer};
use firnray::analytic::AnalyticRayTracer;

let log = firnray_test_support::quiet_log();
let tracer = AnalyticRayTracer::new(MediumProfile::south_pole_simple(), log);
let request = PropagationRequest::new([300., 0., -200.], [0., 0., -100.])
    .frequencies(&[0.1, 0.3]);

for solution in tracer.find_solutions(&request).unwrap().iter() {
    println!("{}: {:.1} ns over {:.1} m", solution.solution_type,
             solution.travel_time, solution.path_length);
}
```

*/

extern crate num_complex;
extern crate rgsl;
#[macro_use] extern crate slog;
extern crate thiserror;

#[cfg(test)] #[macro_use] extern crate assert_approx_eq;

use slog::Logger;
use std::fmt;
use std::str::FromStr;

pub mod analytic;
pub mod attenuation;
pub mod direct_ray;
pub mod error;
pub mod medium;
pub mod numerics;
pub mod reflection;
pub mod solution;

pub use attenuation::AttenuationModel;
pub use error::{RayTracingError, Result};
pub use medium::MediumProfile;
pub use solution::{RaySolution, ReflectionCase, SolutionSet, SolutionType};

/// The speed of light in vacuum, in metres per nanosecond.
pub const SPEED_LIGHT: f64 = 0.299792458;

/// Relative accuracy of attenuation integrals unless configured otherwise.
pub const DEFAULT_INTEGRATION_TOLERANCE: f64 = 1e-6;


/// What to trace: a source, a receiver and the frequencies at which we want
/// attenuation factors.
#[derive(Clone, Debug, PartialEq)]
pub struct PropagationRequest {
    source: [f64; 3],
    receiver: [f64; 3],
    frequencies: Vec<f64>,
    tolerance: f64,
    max_reflections: usize,
}

impl PropagationRequest {
    /// Create a request with no frequencies, a root-finding tolerance of
    /// 1 µm and a budget of one reflection.
    pub fn new(source: [f64; 3], receiver: [f64; 3]) -> Self {
        PropagationRequest {
            source,
            receiver,
            frequencies: Vec::new(),
            tolerance: 1e-6,
            max_reflections: 1,
        }
    }

    /// Set the frequencies (GHz) at which attenuation factors are tabulated
    /// for every solution.
    pub fn frequencies(mut self, frequencies: &[f64]) -> Self {
        self.frequencies = frequencies.to_vec();
        self
    }

    /// Set the tolerance, in metres, on the horizontal miss distance of a
    /// solution.
    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the maximum number of reflections, at the surface and the bottom
    /// combined, that a solution may have.
    pub fn max_reflections(mut self, n: usize) -> Self {
        self.max_reflections = n;
        self
    }

    pub fn source(&self) -> [f64; 3] {
        self.source
    }

    pub fn receiver(&self) -> [f64; 3] {
        self.receiver
    }

    pub fn frequencies_ghz(&self) -> &[f64] {
        &self.frequencies
    }

    pub fn root_tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn reflection_budget(&self) -> usize {
        self.max_reflections
    }

    pub(crate) fn check_frequencies(&self) -> Result<()> {
        for &f in &self.frequencies {
            if !(f >= 0.) || !f.is_finite() {
                return Err(RayTracingError::out_of_domain("frequency", f, 0., std::f64::INFINITY));
            }
        }

        Ok(())
    }
}


/// The interface shared by all ray tracers.
///
/// Ray tracers never modify their medium and keep no per-request state, so
/// a single instance can serve requests from many threads at once.
pub trait RayTracer: Send + Sync {
    /// The name under which this backend is selected.
    fn name(&self) -> &'static str;

    /// The medium rays are traced through.
    fn medium(&self) -> &MediumProfile;

    /// Find all the rays connecting the source of `request` to its receiver.
    /// An empty set means the receiver is in the shadow of the source.
    fn find_solutions(&self, request: &PropagationRequest) -> Result<SolutionSet>;

    fn get_number_of_solutions(&self, request: &PropagationRequest) -> Result<usize> {
        Ok(self.find_solutions(request)?.len())
    }

    fn get_travel_time(&self, solution: &RaySolution) -> f64 {
        solution.travel_time
    }

    fn get_path_length(&self, solution: &RaySolution) -> f64 {
        solution.path_length
    }

    /// The amplitude attenuation factor of `solution` at `frequency` (GHz),
    /// whether or not that frequency was part of the request.
    fn get_attenuation(&self, solution: &RaySolution, frequency: f64) -> Result<f64> {
        solution.attenuation_along(self.medium(), frequency, DEFAULT_INTEGRATION_TOLERANCE)
    }

    fn get_launch_vector(&self, solution: &RaySolution) -> [f64; 3] {
        solution.launch_vector
    }

    fn get_receive_vector(&self, solution: &RaySolution) -> [f64; 3] {
        solution.receive_vector
    }

    /// `n_points` positions along the path, from the source to the receiver.
    fn get_path(&self, solution: &RaySolution, n_points: usize) -> Vec<[f64; 3]> {
        solution.sample_path(self.medium(), n_points)
    }

    fn get_focusing(&self, solution: &RaySolution) -> f64 {
        solution.focusing_factor
    }
}


/// The known ray-tracing backends.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum Backend {
    /// `analytic::AnalyticRayTracer`.
    Analytic,

    /// `direct_ray::DirectRayTracer`.
    DirectRay,

    /// Numerical integration through arbitrary media. This lives outside
    /// this crate; anything implementing `RayTracer` will do.
    Numerical,
}

impl Backend {
    /// Instantiate the backend for `medium`.
    ///
    /// ## Errors
    ///
    /// `Numerical` gives a `Configuration` error, since this crate does not
    /// provide it.
    pub fn create(self, medium: MediumProfile, logger: Logger) -> Result<Box<dyn RayTracer>> {
        match self {
            Backend::Analytic => Ok(Box::new(analytic::AnalyticRayTracer::new(medium, logger))),
            Backend::DirectRay => Ok(Box::new(direct_ray::DirectRayTracer::new(medium, logger))),
            Backend::Numerical => Err(RayTracingError::Configuration(
                "the numerical ray tracer is provided by a separate crate".to_owned()
            )),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Backend::Analytic => write!(f, "analytic"),
            Backend::DirectRay => write!(f, "direct_ray"),
            Backend::Numerical => write!(f, "numerical"),
        }
    }
}

impl FromStr for Backend {
    type Err = RayTracingError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "analytic" => Ok(Backend::Analytic),
            "direct_ray" | "fallback" | "straight_line" => Ok(Backend::DirectRay),
            "numerical" | "radiopropa" => Ok(Backend::Numerical),
            other => Err(RayTracingError::Configuration(format!("unknown ray tracer \"{}\"", other))),
        }
    }
}


/// Look up a backend by name and instantiate it.
pub fn ray_tracer_for_backend(name: &str, medium: MediumProfile, logger: Logger) -> Result<Box<dyn RayTracer>> {
    name.parse::<Backend>()?.create(medium, logger)
}


#[cfg(test)]
mod tests {
    use super::*;

    fn logger() -> Logger {
        Logger::root(slog::Discard, o!())
    }

    #[test]
    fn backend_names() {
        assert_eq!("analytic".parse::<Backend>().unwrap(), Backend::Analytic);
        assert_eq!("fallback".parse::<Backend>().unwrap(), Backend::DirectRay);
        assert_eq!("straight_line".parse::<Backend>().unwrap(), Backend::DirectRay);
        assert_eq!("radiopropa".parse::<Backend>().unwrap(), Backend::Numerical);
        assert!("magic".parse::<Backend>().is_err());

        for b in &[Backend::Analytic, Backend::DirectRay, Backend::Numerical] {
            assert_eq!(b.to_string().parse::<Backend>().unwrap(), *b);
        }
    }

    #[test]
    fn backend_selection() {
        let m = MediumProfile::south_pole_simple();
        assert_eq!(ray_tracer_for_backend("analytic", m.clone(), logger()).unwrap().name(), "analytic");
        assert_eq!(ray_tracer_for_backend("fallback", m.clone(), logger()).unwrap().name(), "direct_ray");

        match ray_tracer_for_backend("numerical", m.clone(), logger()) {
            Err(RayTracingError::Configuration(_)) => {},
            Err(e) => panic!("expected a configuration error, got {}", e),
            Ok(_) => panic!("expected a configuration error"),
        }

        assert!(ray_tracer_for_backend("", m, logger()).is_err());
    }

    #[test]
    fn request_defaults() {
        let r = PropagationRequest::new([1., 2., -3.], [4., 5., -6.]);
        assert_eq!(r.root_tolerance(), 1e-6);
        assert_eq!(r.reflection_budget(), 1);
        assert!(r.frequencies_ghz().is_empty());
        assert!(r.clone().frequencies(&[0.1, 0.]).check_frequencies().is_ok());
        assert!(r.frequencies(&[f64::NAN]).check_frequencies().is_err());
    }
}
