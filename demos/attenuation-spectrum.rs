// Copyright 2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

/// Print the attenuation of every solution for one geometry as a function
/// of frequency, and optionally the sampled ray paths.

#[macro_use]
extern crate clap;
extern crate firnray;
extern crate firnray_test_support;

use clap::{Arg, ArgAction, Command};
use firnray::{MediumProfile, PropagationRequest, RayTracer};
use firnray::analytic::AnalyticRayTracer;

const N_FREQS: usize = 40;
const F_MIN: f64 = 0.025; // GHz
const F_MAX: f64 = 1.; // GHz

fn main() {
    let matches = Command::new("attenuation-spectrum")
        .version(crate_version!())
        .about("Tabulate the attenuation of each ray from a source to a receiver")
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
             .value_parser(firnray::medium::MEDIUM_NAMES.to_vec())
             .default_value("southpole_simple"))
        .arg(Arg::new("paths")
             .long("paths")
             .help("Also print 100 points along each ray")
             .action(ArgAction::SetTrue))
        .get_matches();

    let z_s = *matches.get_one::<f64>("Z_SOURCE").unwrap();
    let z_r = *matches.get_one::<f64>("Z_RECEIVER").unwrap();
    let d = *matches.get_one::<f64>("DISTANCE").unwrap();
    let medium = MediumProfile::by_name(matches.get_one::<String>("medium").unwrap()).unwrap();

    let freqs: Vec<f64> = (0..N_FREQS)
        .map(|i| F_MIN * (F_MAX / F_MIN).powf(i as f64 / (N_FREQS - 1) as f64))
        .collect();

    let tracer = AnalyticRayTracer::new(medium, firnray_test_support::default_log());
    let req = PropagationRequest::new([d, 0., z_s], [0., 0., z_r]).frequencies(&freqs);
    let sols = tracer.find_solutions(&req).expect("ray tracing failed");

    print!("f(GHz)");
    for (i, s) in sols.iter().enumerate() {
        print!("\t{}{}", s.solution_type, i);
    }
    println!();

    for (k, f) in freqs.iter().enumerate() {
        print!("{:.6}", f);
        for s in sols.iter() {
            print!("\t{:.8e}", s.attenuation[k].1);
        }
        println!();
    }

    if matches.get_flag("paths") {
        for (i, s) in sols.iter().enumerate() {
            println!();
            println!("# path of solution {} ({})", i, s.solution_type);

            for p in tracer.get_path(s, 100) {
                println!("{:.6}\t{:.6}\t{:.6}", p[0], p[1], p[2]);
            }
        }
    }
}
