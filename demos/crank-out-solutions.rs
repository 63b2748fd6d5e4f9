// Copyright 2017-2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

/// Crank out ray-tracing solutions for random geometries.
///
/// Each output line holds one geometry: the source and receiver depths, the
/// horizontal distance, the time spent, the number of solutions, and the
/// type, path length and travel time of up to three of them.

#[macro_use]
extern crate clap;
extern crate firnray;
extern crate firnray_test_support;
#[macro_use] extern crate slog;

use clap::{Arg, Command};
use firnray::{MediumProfile, PropagationRequest, ray_tracer_for_backend};
use firnray_test_support::GeometrySampler;
use std::fs::OpenOptions;
use std::io::prelude::*;
use std::path::PathBuf;
use std::time::Instant;

fn main() {
    let matches = Command::new("crank-out-solutions")
        .version(crate_version!())
        .about("Crank out ray-tracing solutions for random source/receiver geometries")
        .arg(Arg::new("OUTFILE")
             .help("The path of the output file to create")
             .required(true)
             .value_parser(value_parser!(PathBuf))
             .index(1))
        .arg(Arg::new("Z_MIN")
             .help("The deepest source to generate, in metres (negative)")
             .required(true)
             .allow_negative_numbers(true)
             .value_parser(value_parser!(f64))
             .index(2))
        .arg(Arg::new("Z_MAX")
             .help("The shallowest source to generate, in metres (negative)")
             .required(true)
             .allow_negative_numbers(true)
             .value_parser(value_parser!(f64))
             .index(3))
        .arg(Arg::new("D_MAX")
             .help("The largest horizontal distance to generate, in metres")
             .required(true)
             .value_parser(value_parser!(f64))
             .index(4))
        .arg(Arg::new("receiver_depth")
             .long("receiver-depth")
             .help("The deepest receiver to generate, in metres (negative)")
             .allow_negative_numbers(true)
             .value_parser(value_parser!(f64))
             .default_value("-200"))
        .arg(Arg::new("medium")
             .long("medium")
             .help("The ice model")
             .default_value("southpole_simple"))
        .arg(Arg::new("backend")
             .long("backend")
             .help("The ray tracer to use")
             .default_value("analytic"))
        .arg(Arg::new("count")
             .long("count")
             .help("Stop after this many geometries (default: run forever)")
             .value_parser(value_parser!(usize)))
        .get_matches();

    let outfile = matches.get_one::<PathBuf>("OUTFILE").unwrap();
    let z_min = *matches.get_one::<f64>("Z_MIN").unwrap();
    let z_max = *matches.get_one::<f64>("Z_MAX").unwrap();
    let d_max = *matches.get_one::<f64>("D_MAX").unwrap();
    let receiver_min = *matches.get_one::<f64>("receiver_depth").unwrap();
    let count = matches.get_one::<usize>("count").cloned();

    let log = firnray_test_support::default_log();
    let medium = MediumProfile::by_name(matches.get_one::<String>("medium").unwrap()).unwrap();
    let tracer = ray_tracer_for_backend(matches.get_one::<String>("backend").unwrap(), medium, log.clone())
        .unwrap();
    let sampler = GeometrySampler::new(z_min, z_max, receiver_min, -1., d_max);

    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(true)
        .open(outfile)
        .unwrap();

    writeln!(file, "# z_s z_r d !time_ms n_sol [type L T]...").expect("write error");

    let mut n_done = 0;

    while count.map(|c| n_done < c).unwrap_or(true) {
        let (source, receiver) = sampler.get();
        let d = (source[0] * source[0] + source[1] * source[1]).sqrt();

        let t0 = Instant::now();
        let result = tracer.find_solutions(&PropagationRequest::new(source, receiver));
        let elapsed = t0.elapsed();
        let ms = elapsed.as_secs() as f64 * 1000. + elapsed.subsec_nanos() as f64 * 1e-6;
        n_done += 1;

        let sols = match result {
            Ok(s) => s,
            Err(e) => {
                warn!(log, "ray tracing failed"; "z_s" => source[2], "z_r" => receiver[2], "d" => d,
                      "error" => e.to_string());
                continue;
            },
        };

        write!(file, "{:.6}\t{:.6}\t{:.6}\t{:.6}\t{}", source[2], receiver[2], d, ms, sols.len())
            .expect("write error");

        for s in sols.iter().take(3) {
            write!(file, "\t{}\t{:.9e}\t{:.9e}", s.solution_type, s.path_length, s.travel_time)
                .expect("write error");
        }

        writeln!(file).expect("write error");
    }
}
