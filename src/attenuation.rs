// Copyright 2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

/*! Attenuation length of radio waves in ice.

All models return the field attenuation length in metres for a depth `z`
(metres, negative below the surface) and a frequency `f` (GHz). A signal that
travels a distance `ds` through ice with attenuation length `L` is multiplied
by `exp(-ds / L)`.

*/

use std::f64;
use std::fmt;
use std::str::FromStr;

use crate::error::RayTracingError;


/// The available attenuation models.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AttenuationModel {
    /// No attenuation at all.
    None,

    /// South Pole: the frequency dependence of the attenuation is log-linear
    /// in two regimes split at 1 GHz, with coefficients that depend on the
    /// local ice temperature, which itself follows a cubic fit in depth.
    SouthPole,

    /// Greenland: a polynomial depth fit of the attenuation length at 75 MHz,
    /// extrapolated linearly in frequency.
    Greenland,

    /// Moore's Bay on the Ross ice shelf: a depth-independent bulk value
    /// derived from bottom-reflection measurements through 576 m of ice.
    MooresBay,

    /// A depth- and frequency-independent attenuation length, in metres.
    Constant(f64),
}


impl AttenuationModel {
    /// The attenuation length in metres. The caller is responsible for
    /// checking that `z` and `frequency` are sensible.
    pub fn attenuation_length(&self, z: f64, frequency: f64) -> f64 {
        match *self {
            AttenuationModel::None => f64::INFINITY,
            AttenuationModel::SouthPole => south_pole(z, frequency),
            AttenuationModel::Greenland => greenland(z, frequency),
            AttenuationModel::MooresBay => moores_bay(frequency),
            AttenuationModel::Constant(length) => length,
        }
    }

    /// Whether the attenuation length is the same at every depth. Path
    /// attenuation then only needs the path length.
    pub fn is_depth_independent(&self) -> bool {
        match *self {
            AttenuationModel::SouthPole | AttenuationModel::Greenland => false,
            _ => true,
        }
    }

    /// Whether this model attenuates at all.
    pub fn is_none(&self) -> bool {
        *self == AttenuationModel::None
    }
}


impl fmt::Display for AttenuationModel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            AttenuationModel::None => write!(f, "none"),
            AttenuationModel::SouthPole => write!(f, "SP1"),
            AttenuationModel::Greenland => write!(f, "GL1"),
            AttenuationModel::MooresBay => write!(f, "MB1"),
            AttenuationModel::Constant(l) => write!(f, "constant({} m)", l),
        }
    }
}


impl FromStr for AttenuationModel {
    type Err = RayTracingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(AttenuationModel::None),
            "SP1" => Ok(AttenuationModel::SouthPole),
            "GL1" => Ok(AttenuationModel::Greenland),
            "MB1" => Ok(AttenuationModel::MooresBay),
            other => Err(RayTracingError::Configuration(format!("unknown attenuation model \"{}\"", other))),
        }
    }
}


/// Ice temperature in degrees Celsius as a function of depth at the South
/// Pole.
pub fn south_pole_temperature(z: f64) -> f64 {
    let d = z.abs();
    1.83415e-09 * d.powi(3) - 1.59061e-08 * d.powi(2) + 0.00267687 * d - 51.0696
}

fn south_pole(z: f64, frequency: f64) -> f64 {
    const F0: f64 = 0.0001;
    const F2: f64 = 3.16;

    let t = south_pole_temperature(z);
    let w0 = F0.ln();
    let w1 = 0.;
    let w2 = F2.ln();
    let w = frequency.ln();

    let b0 = -6.74890 + t * (0.026709 - t * 0.000884);
    let b1 = -6.22121 - t * (0.070927 + t * 0.001773);
    let b2 = -4.09468 - t * (0.002213 + t * 0.000332);

    let (a, slope) = if frequency < 1. {
        ((b1 * w0 - b0 * w1) / (w0 - w1), (b1 - b0) / (w1 - w0))
    } else {
        ((b2 * w1 - b1 * w2) / (w1 - w2), (b2 - b1) / (w2 - w1))
    };

    (-(a + slope * w)).exp()
}

fn greenland(z: f64, frequency: f64) -> f64 {
    const FIT: [f64; 6] = [
        1.16052586e+03,
        6.87257150e-02,
        -9.82378264e-05,
        -3.50628312e-07,
        -2.21040482e-10,
        -3.63912864e-14,
    ];
    const MIN_LENGTH_75MHZ: f64 = 100.;
    const MIN_LENGTH: f64 = 1.;
    const SLOPE_PER_MHZ: f64 = 0.55;

    let mut at_75 = 0.;
    let mut zp = 1.;

    for c in FIT.iter() {
        at_75 += c * zp;
        zp *= z;
    }

    let at_75 = at_75.max(MIN_LENGTH_75MHZ);
    (at_75 - SLOPE_PER_MHZ * (frequency * 1000. - 75.)).max(MIN_LENGTH)
}

fn moores_bay(frequency: f64) -> f64 {
    const REFLECTIVITY: f64 = 0.82;
    const ICE_THICKNESS: f64 = 576.;
    const MIN_LENGTH: f64 = 1.;

    // The linear fit goes negative above about 2.56 GHz.
    let bulk = (460. - 180. * frequency).max(MIN_LENGTH);
    bulk / (1. + bulk / (2. * ICE_THICKNESS) * REFLECTIVITY.ln())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn south_pole_temperature_profile() {
        assert_approx_eq!(south_pole_temperature(0.), -51.0696, 1e-10);
        assert_approx_eq!(south_pole_temperature(-1000.), -46.5744861, 1e-6);
    }

    #[test]
    fn south_pole_values() {
        let l = AttenuationModel::SouthPole;
        assert_approx_eq!(l.attenuation_length(-1000., 0.3), 1306.5, 0.5);
        assert_approx_eq!(l.attenuation_length(0., 0.1), 3047.2, 0.5);
    }

    #[test]
    fn south_pole_decreases_with_frequency() {
        let l = AttenuationModel::SouthPole;

        for &z in &[0., -200., -1000., -2000., -2800.] {
            let mut last = f64::INFINITY;

            for i in 1..60 {
                let f = 0.025 * i as f64;
                let a = l.attenuation_length(z, f);
                assert!(a < last, "not decreasing at z = {}, f = {}", z, f);
                last = a;
            }
        }
    }

    #[test]
    fn moores_bay_is_depth_independent() {
        let l = AttenuationModel::MooresBay;
        assert!(l.is_depth_independent());
        assert_eq!(l.attenuation_length(-10., 0.2), l.attenuation_length(-500., 0.2));
        assert!(l.attenuation_length(0., 0.1) > l.attenuation_length(0., 0.5));
    }

    #[test]
    fn moores_bay_clamps() {
        let l = AttenuationModel::MooresBay;
        let at_2 = l.attenuation_length(0., 2.);
        let at_3 = l.attenuation_length(0., 3.);
        assert!(at_3 > 0.);
        assert!(at_3 < at_2);
        assert_eq!(at_3, l.attenuation_length(0., 10.));
    }

    #[test]
    fn greenland_clamps() {
        let l = AttenuationModel::Greenland;
        assert_approx_eq!(l.attenuation_length(0., 0.075), 1160.52586, 1e-4);
        assert_eq!(l.attenuation_length(0., 100.), 1.);
    }

    #[test]
    fn names_round_trip() {
        for name in &["none", "SP1", "GL1", "MB1"] {
            let m: AttenuationModel = name.parse().unwrap();
            assert_eq!(m.to_string(), *name);
        }

        assert!("XY9".parse::<AttenuationModel>().is_err());
    }
}
