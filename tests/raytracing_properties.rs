// Copyright 2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

/// Physical properties that every set of ray-tracing solutions must have.

#[macro_use] extern crate assert_approx_eq;
extern crate firnray;
extern crate firnray_test_support;

use firnray::{AttenuationModel, MediumProfile, PropagationRequest, RayTracer, ReflectionCase,
              SolutionType, ray_tracer_for_backend};
use firnray::analytic::AnalyticRayTracer;
use firnray_test_support::{GeometrySampler, quiet_log};
use std::sync::Arc;
use std::thread;

fn south_pole() -> AnalyticRayTracer {
    AnalyticRayTracer::new(MediumProfile::south_pole_simple(), quiet_log())
}

#[test]
fn snell_invariant() {
    let tracer = south_pole();
    let medium = tracer.medium().clone();
    let sampler = GeometrySampler::new(-2000., -50., -300., -5., 2000.);

    for _ in 0..30 {
        let (source, receiver) = sampler.get();
        let sols = tracer.find_solutions(&PropagationRequest::new(source, receiver)).unwrap();
        let n_s = medium.index_of_refraction(source[2]).unwrap();
        let n_r = medium.index_of_refraction(receiver[2]).unwrap();

        for s in sols.iter() {
            let p_launch = n_s * s.launch_zenith().sin();
            let p_receive = n_r * s.receive_zenith().sin();
            assert_approx_eq!(p_launch, p_receive, 1e-6);
            assert!(s.travel_time >= 0. && s.travel_time.is_finite());
            assert!(s.path_length >= 0. && s.path_length.is_finite());
        }
    }
}

#[test]
fn flat_medium_is_a_straight_line() {
    let medium = MediumProfile::uniform(1.78).attenuation(AttenuationModel::Constant(800.)).finish().unwrap();
    let analytic = ray_tracer_for_backend("analytic", medium.clone(), quiet_log()).unwrap();
    let straight = ray_tracer_for_backend("straight_line", medium, quiet_log()).unwrap();

    let sampler = GeometrySampler::new(-1500., -10., -200., -10., 1500.);

    for _ in 0..20 {
        let (source, receiver) = sampler.get();
        let req = PropagationRequest::new(source, receiver).frequencies(&[0.1, 0.5]).max_reflections(0);

        let a = analytic.find_solutions(&req).unwrap();
        let s = straight.find_solutions(&req).unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(s.len(), 1);
        assert_eq!(a[0].solution_type, SolutionType::Direct);

        assert_approx_eq!(a[0].path_length, s[0].path_length, 1e-6);
        assert_approx_eq!(a[0].travel_time, s[0].travel_time, 1e-6);
        assert_approx_eq!(a[0].focusing_factor, 1., 1e-12);

        for k in 0..3 {
            assert_approx_eq!(a[0].launch_vector[k], s[0].launch_vector[k], 1e-9);
            assert_approx_eq!(a[0].receive_vector[k], s[0].receive_vector[k], 1e-9);
        }

        for (x, y) in a[0].attenuation.iter().zip(s[0].attenuation.iter()) {
            assert_approx_eq!(x.1, y.1, 1e-9);
        }
    }
}

#[test]
fn reciprocity() {
    let tracer = south_pole();

    for &(z_1, z_2, d) in &[(-800., -150., 700.), (-200., -100., 300.), (-1463.902, -122.021, 2929.953),
                            (-200., -100., 0.), (-900., -60., 0.)] {
        let forward = tracer.find_solutions(&PropagationRequest::new([d, 0., z_1], [0., 0., z_2])).unwrap();
        let backward = tracer.find_solutions(&PropagationRequest::new([0., 0., z_2], [d, 0., z_1])).unwrap();
        assert!(!forward.is_empty());
        assert_eq!(forward.len(), backward.len());

        for (f, b) in forward.iter().zip(backward.iter()) {
            assert_eq!(f.solution_type, b.solution_type);
            assert_approx_eq!(f.path_length, b.path_length, 1e-4);
            assert_approx_eq!(f.travel_time, b.travel_time, 1e-4);
        }
    }
}

#[test]
fn direct_path_grows_with_depth_difference() {
    let tracer = south_pole();
    let mut last = 0.;

    for &z_r in &[-1400., -1200., -1000., -800.] {
        let sols = tracer.find_solutions(&PropagationRequest::new([200., 0., -1500.], [0., 0., z_r])).unwrap();
        let direct = sols.iter().find(|s| s.solution_type == SolutionType::Direct).unwrap();
        assert!(direct.path_length > last);
        last = direct.path_length;
    }

    assert_approx_eq!(last, (200_f64 * 200. + 700. * 700.).sqrt(), 0.1);
}

#[test]
fn shadow_zone() {
    let tracer = south_pole();

    for &(z_s, z_r, d) in &[(-200., -10., 2000.), (-5., -5., 1000.)] {
        let sols = tracer.find_solutions(&PropagationRequest::new([d, 0., z_s], [0., 0., z_r])).unwrap();
        assert!(sols.is_empty(), "expected no solutions for {} -> {} over {} m", z_s, z_r, d);
    }
}

#[test]
fn bottom_reflection_adds_one_solution() {
    let shelf = MediumProfile::moores_bay_simple();
    let open = MediumProfile::exponential(shelf.n_ice(), shelf.delta_n(), shelf.z_0())
        .attenuation(shelf.attenuation_model())
        .finish().unwrap();

    let req = PropagationRequest::new([300., 0., -400.], [0., 0., -450.]);
    let with = AnalyticRayTracer::new(shelf, quiet_log()).find_solutions(&req).unwrap();
    let without = AnalyticRayTracer::new(open, quiet_log()).find_solutions(&req).unwrap();

    assert_eq!(with.len(), without.len() + 1);

    let extra: Vec<_> = with.iter().filter(|s| s.bottom_reflections == 1).collect();
    assert_eq!(extra.len(), 1);
    assert_eq!(extra[0].solution_type, SolutionType::Reflected);
    assert_eq!(extra[0].reflection_case, ReflectionCase::Downward);

    // A receiver the open ice cannot reach at all.
    let req = PropagationRequest::new([500., 0., -100.], [0., 0., -50.]);
    let shelf = MediumProfile::moores_bay_simple();
    let open = MediumProfile::exponential(1.78, 0.46, 34.5).finish().unwrap();
    assert!(AnalyticRayTracer::new(open, quiet_log()).find_solutions(&req).unwrap().is_empty());

    let bounced = AnalyticRayTracer::new(shelf, quiet_log()).find_solutions(&req).unwrap();
    assert_eq!(bounced.len(), 1);
    assert_eq!(bounced[0].reflection_case, ReflectionCase::Downward);
}

#[test]
fn attenuation_falls_with_frequency() {
    let tracer = south_pole();
    let freqs: Vec<f64> = (1..20).map(|i| 0.05 * i as f64).collect();
    let req = PropagationRequest::new([700., 0., -800.], [0., 0., -150.]).frequencies(&freqs);
    let sols = tracer.find_solutions(&req).unwrap();
    assert!(!sols.is_empty());

    for s in sols.iter() {
        let mut last = 1.;

        for &(_, a) in &s.attenuation {
            assert!(a < last);
            last = a;
        }

        assert_eq!(tracer.get_attenuation(s, 0.).unwrap(), 1.);
    }

    // Longer paths lose more.
    let direct = &sols[0];
    let reflected = &sols[1];
    assert!(reflected.path_length > direct.path_length);
    assert!(reflected.attenuation[5].1 < direct.attenuation[5].1);
}

#[test]
fn attenuation_never_amplifies() {
    let tracer = AnalyticRayTracer::new(MediumProfile::moores_bay_simple(), quiet_log());
    let req = PropagationRequest::new([300., 0., -400.], [0., 0., -450.]).frequencies(&[1., 2., 3., 5.]);
    let sols = tracer.find_solutions(&req).unwrap();
    assert!(!sols.is_empty());

    for s in sols.iter() {
        let mut last = 1.;

        for &(_, a) in &s.attenuation {
            assert!(a >= 0. && a <= last);
            last = a;
        }
    }
}

#[test]
fn path_connects_the_endpoints() {
    let tracer = south_pole();
    let source = [300., 400., -200.];
    let receiver = [0., 0., -100.];
    let sols = tracer.find_solutions(&PropagationRequest::new(source, receiver)).unwrap();
    assert_eq!(sols.len(), 2);

    for s in sols.iter() {
        let path = tracer.get_path(s, 200);
        assert_eq!(path.len(), 200);

        for k in 0..3 {
            assert_approx_eq!(path[0][k], source[k], 1e-9);
            assert_approx_eq!(path[199][k], receiver[k], 1e-3);
        }

        assert!(path.iter().all(|p| p[2] <= 1e-9));
    }

    // The reflected ray touches the surface.
    let top = tracer.get_path(&sols[1], 400).iter().map(|p| p[2]).fold(-1e9, f64::max);
    assert_approx_eq!(top, 0., 2.);
}

#[test]
fn backends_share_threads() {
    let tracer: Arc<dyn RayTracer> = Arc::from(
        ray_tracer_for_backend("analytic", MediumProfile::greenland_simple(), quiet_log()).unwrap()
    );

    let handles: Vec<_> = (0..4).map(|i| {
        let tracer = tracer.clone();
        thread::spawn(move || {
            let req = PropagationRequest::new([100. + 100. * i as f64, 0., -300.], [0., 0., -100.]);
            tracer.get_number_of_solutions(&req).unwrap()
        })
    }).collect();

    for h in handles {
        assert!(h.join().unwrap() > 0);
    }
}
