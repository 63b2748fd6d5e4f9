// Copyright 2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

/// Trace one source/receiver geometry and print everything we know about
/// the solutions.

#[macro_use]
extern crate clap;
extern crate firnray;
extern crate firnray_test_support;

use clap::{Arg, Command};
use firnray::{MediumProfile, PropagationRequest, ray_tracer_for_backend};
use std::process;

const FREQUENCY: f64 = 0.3;

fn main() {
    let matches = Command::new("one-raytrace")
        .version(crate_version!())
        .about("Find the rays connecting a source to a receiver")
        .arg(Arg::new("Z_SOURCE")
             .help("The depth of the source, in metres (negative)")
             .required(true)
             .allow_negative_numbers(true)
             .value_parser(value_parser!(f64))
             .index(1))
        .arg(Arg::new("Z_RECEIVER")
             .help("The depth of the receiver, in metres (negative)")
             .required(true)
             .allow_negative_numbers(true)
             .value_parser(value_parser!(f64))
             .index(2))
        .arg(Arg::new("DISTANCE")
             .help("The horizontal distance between the two, in metres")
             .required(true)
             .value_parser(value_parser!(f64))
             .index(3))
        .arg(Arg::new("medium")
             .long("medium")
             .help("The ice model")
             .default_value("southpole_simple"))
        .arg(Arg::new("backend")
             .long("backend")
             .help("The ray tracer to use")
             .default_value("analytic"))
        .arg(Arg::new("max_reflections")
             .long("max-reflections")
             .help("The maximum number of reflections per ray")
             .value_parser(value_parser!(usize))
             .default_value("1"))
        .get_matches();

    let z_s = *matches.get_one::<f64>("Z_SOURCE").unwrap();
    let z_r = *matches.get_one::<f64>("Z_RECEIVER").unwrap();
    let d = *matches.get_one::<f64>("DISTANCE").unwrap();
    let max_reflections = *matches.get_one::<usize>("max_reflections").unwrap();
    let medium_name = matches.get_one::<String>("medium").unwrap();
    let backend = matches.get_one::<String>("backend").unwrap();

    let log = firnray_test_support::default_log();

    let medium = MediumProfile::by_name(medium_name).unwrap_or_else(|e| {
        eprintln!("error: {}", e);
        process::exit(1);
    });

    let tracer = ray_tracer_for_backend(backend, medium, log).unwrap_or_else(|e| {
        eprintln!("error: {}", e);
        process::exit(1);
    });

    let req = PropagationRequest::new([d, 0., z_s], [0., 0., z_r])
        .frequencies(&[FREQUENCY])
        .max_reflections(max_reflections);

    let sols = tracer.find_solutions(&req).unwrap_or_else(|e| {
        eprintln!("error: {}", e);
        process::exit(1);
    });

    if sols.is_empty() {
        println!("no solutions: the receiver is in the shadow zone");
        return;
    }

    println!("type\tcase\tzenith_launch(deg)\tzenith_receive(deg)\tL(m)\tT(ns)\tatten@{}GHz\tfocusing\t|r_par|\t|r_perp|",
             FREQUENCY);

    for s in sols.iter() {
        println!("{}\t{:?}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.4}\t{:.4}",
                 s.solution_type, s.reflection_case,
                 s.launch_zenith().to_degrees(), s.receive_zenith().to_degrees(),
                 s.path_length, s.travel_time,
                 s.tabulated_attenuation(FREQUENCY).unwrap_or(1.), s.focusing_factor,
                 s.reflection_coefficients[0].norm(), s.reflection_coefficients[1].norm());
    }

    for i in 1..sols.len() {
        if let Some(dt) = sols.time_delay(0, i) {
            println!("delay of solution {} relative to solution 0: {:.3} ns", i, dt);
        }
    }
}
