// Copyright 2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

//! A straight-line ray tracer, for debugging and as a fallback. Rays travel
//! at the speed of light in surface ice and are never bent or reflected.

use num_complex::Complex64;
use slog::Logger;

use crate::{PropagationRequest, RayTracer, SPEED_LIGHT, DEFAULT_INTEGRATION_TOLERANCE};
use crate::error::{RayTracingError, Result};
use crate::medium::MediumProfile;
use crate::solution::{Leg, LegEnd, LegShape, RaySolution, ReflectionCase, SolutionSet, SolutionType};


/// Connects every source to its receiver with exactly one straight ray.
pub struct DirectRayTracer {
    medium: MediumProfile,
    logger: Logger,
}


impl DirectRayTracer {
    pub fn new(medium: MediumProfile, logger: Logger) -> Self {
        DirectRayTracer { medium, logger }
    }
}


impl RayTracer for DirectRayTracer {
    fn name(&self) -> &'static str {
        "direct_ray"
    }

    fn medium(&self) -> &MediumProfile {
        &self.medium
    }

    fn find_solutions(&self, request: &PropagationRequest) -> Result<SolutionSet> {
        let source = request.source();
        let receiver = request.receiver();

        if source.iter().chain(receiver.iter()).any(|c| !c.is_finite()) {
            return Err(RayTracingError::InvalidGeometry("positions must be finite".to_owned()));
        }

        self.medium.check_depth(source[2])?;
        self.medium.check_depth(receiver[2])?;
        request.check_frequencies()?;

        let delta = [receiver[0] - source[0], receiver[1] - source[1], receiver[2] - source[2]];
        let horizontal = delta[0].hypot(delta[1]);
        let length = horizontal.hypot(delta[2]);

        if length == 0. {
            return Err(RayTracingError::InvalidGeometry("source and receiver coincide".to_owned()));
        }

        let n = self.medium.n_surface();
        let time = length * n / SPEED_LIGHT;
        let direction = [delta[0] / length, delta[1] / length, delta[2] / length];

        let mut solution = RaySolution {
            solution_type: SolutionType::Direct,
            reflection_case: ReflectionCase::None,
            ray_parameter: n * horizontal / length,
            launch_vector: direction,
            receive_vector: [-direction[0], -direction[1], -direction[2]],
            travel_time: time,
            path_length: length,
            attenuation: Vec::with_capacity(request.frequencies_ghz().len()),
            focusing_factor: 1.,
            surface_reflections: 0,
            bottom_reflections: 0,
            reflection_coefficients: [Complex64::new(1., 0.); 2],
            turning_point: None,
            source,
            receiver,
            legs: vec![Leg {
                z_start: source[2],
                z_end: receiver[2],
                horizontal,
                length,
                time,
                shape: LegShape::Straight,
                end: LegEnd::Receiver,
            }],
        };

        for &f in request.frequencies_ghz() {
            let a = solution.attenuation_along(&self.medium, f, DEFAULT_INTEGRATION_TOLERANCE)?;
            solution.attenuation.push((f, a));
        }

        debug!(self.logger, "straight-line solution"; "path_length" => length, "travel_time" => time);
        Ok(SolutionSet::new(vec![solution]))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::attenuation::AttenuationModel;

    fn tracer(medium: MediumProfile) -> DirectRayTracer {
        DirectRayTracer::new(medium, Logger::root(slog::Discard, o!()))
    }

    #[test]
    fn one_straight_solution() {
        let t = tracer(MediumProfile::south_pole_simple());
        let req = PropagationRequest::new([0., 0., -200.], [300., 400., -200.]);
        let sols = t.find_solutions(&req).unwrap();

        assert_eq!(sols.len(), 1);
        assert_eq!(t.get_number_of_solutions(&req).unwrap(), 1);
        assert_approx_eq!(t.get_path_length(&sols[0]), 500., 1e-12);
        assert_approx_eq!(t.get_travel_time(&sols[0]), 500. * 1.353 / SPEED_LIGHT, 1e-9);
        assert_eq!(t.get_focusing(&sols[0]), 1.);
        assert_approx_eq!(t.get_launch_vector(&sols[0])[0], 0.6, 1e-12);
        assert_approx_eq!(t.get_receive_vector(&sols[0])[1], -0.8, 1e-12);
    }

    #[test]
    fn air_is_allowed() {
        let t = tracer(MediumProfile::south_pole_simple());
        let req = PropagationRequest::new([0., 0., -100.], [0., 100., 50.]);
        assert_eq!(t.find_solutions(&req).unwrap().len(), 1);

        let req = PropagationRequest::new([0., 0., -100.], [0., 100., 5000.]);
        assert!(t.find_solutions(&req).is_err());
    }

    #[test]
    fn attenuation_along_a_line() {
        let medium = MediumProfile::uniform(1.78).attenuation(AttenuationModel::Constant(250.)).finish().unwrap();
        let t = tracer(medium);
        let req = PropagationRequest::new([0., 0., -100.], [0., 100., -100.]).frequencies(&[0.2]);
        let sols = t.find_solutions(&req).unwrap();
        assert_approx_eq!(sols[0].tabulated_attenuation(0.2).unwrap(), (-0.4_f64).exp(), 1e-12);
    }

    #[test]
    fn coincident() {
        let t = tracer(MediumProfile::south_pole_simple());
        let req = PropagationRequest::new([5., 5., -100.], [5., 5., -100.]);

        match t.find_solutions(&req) {
            Err(RayTracingError::InvalidGeometry(_)) => {},
            other => panic!("expected InvalidGeometry, got {:?}", other),
        }
    }
}
