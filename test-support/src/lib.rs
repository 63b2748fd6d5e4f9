// Copyright 2017-2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

//! Small helpers shared by the firnray tests, benchmarks and demo programs.

extern crate rand;
#[macro_use] extern crate slog;
extern crate slog_async;
extern crate slog_term;

use slog::Drain;

/// Create a simple `slog` logger for use in test and demo programs.
///
/// It logs to the terminal using default parameters, as per the `slog` basic
/// example.
pub fn default_log() -> slog::Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain)
        .overflow_strategy(slog_async::OverflowStrategy::Block)
        .build().fuse();
    slog::Logger::root(drain, o!())
}


/// A logger that throws everything away, for tests that only care about
/// results.
pub fn quiet_log() -> slog::Logger {
    slog::Logger::root(slog::Discard, o!())
}


/// A simple utility for sampling random numbers.
///
/// The distribution can be uniform or log-uniform.
pub struct Sampler {
    is_log: bool,
    low: f64,
    range: f64
}

impl Sampler {
    /// Create a new Sampler. The bounds may be given in either order.
    pub fn new(is_log: bool, low: f64, high: f64) -> Self {
        let (mut low, mut high) = if low > high { (high, low) } else { (low, high) };

        if is_log {
            low = low.ln();
            high = high.ln();
        }

        Sampler { is_log, low, range: high - low }
    }

    /// Sample a number from the distribution.
    pub fn get(&self) -> f64 {
        let n = self.low + rand::random::<f64>() * self.range;

        if self.is_log {
            n.exp()
        } else {
            n
        }
    }
}


/// Draws random source/receiver geometries inside an ice volume.
///
/// Depths are uniform in `[min_depth, max_depth]` (both negative, in
/// metres) and the horizontal separation is uniform in `[0, max_distance]`
/// along a random azimuth. Receivers always sit at the origin column.
pub struct GeometrySampler {
    depth: Sampler,
    receiver_depth: Sampler,
    distance: Sampler,
    azimuth: Sampler,
}

impl GeometrySampler {
    /// Create a new sampler. Source depths come from `[min_depth,
    /// max_depth]`; receiver depths from `[receiver_min, receiver_max]`.
    pub fn new(min_depth: f64, max_depth: f64, receiver_min: f64, receiver_max: f64,
               max_distance: f64) -> Self {
        GeometrySampler {
            depth: Sampler::new(false, min_depth, max_depth),
            receiver_depth: Sampler::new(false, receiver_min, receiver_max),
            distance: Sampler::new(false, 0., max_distance),
            azimuth: Sampler::new(false, 0., 2. * std::f64::consts::PI),
        }
    }

    /// Sample a `(source, receiver)` pair of positions.
    pub fn get(&self) -> ([f64; 3], [f64; 3]) {
        let d = self.distance.get();
        let phi = self.azimuth.get();
        let source = [d * phi.cos(), d * phi.sin(), self.depth.get()];
        let receiver = [0., 0., self.receiver_depth.get()];
        (source, receiver)
    }
}
