// Copyright 2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

/*! Ice models: index of refraction and attenuation as a function of depth.

The index of refraction follows the exponential firn profile

```text
n(z) = n_ice - delta_n * exp(z / z_0)      for z <= 0
n(z) = n_air                               for z > 0
```

where *z* is measured upward from the ice surface (so the ice is at negative
*z*), `n_ice` is the index of deep ice, `n_ice - delta_n` the index at the
surface and `z_0` the scale depth of the firn. A profile with `delta_n = 0`
is uniform ice, which is handy for validating the solvers.

A medium may also have a reflective bottom layer (the ice–water interface of
an ice shelf, say) with a given amplitude reflection coefficient.

Media are immutable once built and are shared read-only by every ray-tracing
request.

*/

use std::f64;

use crate::SPEED_LIGHT;
use crate::attenuation::AttenuationModel;
use crate::error::{RayTracingError, Result};


/// A reflective layer at the bottom of the ice.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReflectiveLayer {
    /// The depth of the layer, in metres (negative).
    pub depth: f64,

    /// The amplitude reflection coefficient of the layer, in [0, 1].
    pub coefficient: f64,
}


/// The horizontal distance, path length (m) and travel time (ns) covered by
/// a ray between two depths.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RaySegment {
    pub horizontal: f64,
    pub length: f64,
    pub time: f64,
}


/// An exponential firn profile plus its attenuation model. See the
/// module-level documentation.
#[derive(Clone, Debug, PartialEq)]
pub struct MediumProfile {
    name: String,
    n_ice: f64,
    delta_n: f64,
    z_0: f64,
    n_air: f64,
    z_min: f64,
    z_max: f64,
    bottom: Option<ReflectiveLayer>,
    attenuation: AttenuationModel,
}


/// Names of the built-in ice models accepted by `MediumProfile::by_name`.
pub const MEDIUM_NAMES: &[&str] = &[
    "southpole_simple",
    "southpole_2015",
    "ARAsim_southpole",
    "greenland_simple",
    "mooresbay_simple",
];

const DEFAULT_Z_MIN: f64 = -5000.;
const DEFAULT_Z_MAX: f64 = 1000.;


impl MediumProfile {
    /// Start building an exponential profile. The remaining parameters
    /// default to a depth range of [-5 km, +1 km], air above the surface, no
    /// bottom reflector and no attenuation.
    pub fn exponential(n_ice: f64, delta_n: f64, z_0: f64) -> MediumBuilder {
        MediumBuilder {
            name: "exponential".to_owned(),
            n_ice,
            delta_n,
            z_0,
            n_air: 1.,
            z_min: DEFAULT_Z_MIN,
            z_max: DEFAULT_Z_MAX,
            bottom: None,
            attenuation: AttenuationModel::None,
        }
    }

    /// Start building a uniform medium with index `n` everywhere below the
    /// surface.
    pub fn uniform(n: f64) -> MediumBuilder {
        let mut b = MediumProfile::exponential(n, 0., 1.);
        b.name = "uniform".to_owned();
        b
    }

    /// Look up one of the built-in ice models by name. See `MEDIUM_NAMES`.
    pub fn by_name(name: &str) -> Result<MediumProfile> {
        match name {
            "southpole_simple" => Ok(MediumProfile::south_pole_simple()),
            "southpole_2015" => Ok(MediumProfile::preset(name, 1.78, 0.423, 77., None, AttenuationModel::SouthPole)),
            "ARAsim_southpole" => Ok(MediumProfile::preset(name, 1.78, 0.43, 75.75, None, AttenuationModel::SouthPole)),
            "greenland_simple" => Ok(MediumProfile::greenland_simple()),
            "mooresbay_simple" => Ok(MediumProfile::moores_bay_simple()),
            other => Err(RayTracingError::Configuration(format!("unknown ice model \"{}\"", other))),
        }
    }

    /// The simple South Pole model.
    pub fn south_pole_simple() -> MediumProfile {
        MediumProfile::preset("southpole_simple", 1.78, 0.427, 71., None, AttenuationModel::SouthPole)
    }

    /// The simple Greenland (Summit Station) model.
    pub fn greenland_simple() -> MediumProfile {
        MediumProfile::preset("greenland_simple", 1.78, 0.51, 37.25, None, AttenuationModel::Greenland)
    }

    /// The simple Moore's Bay model: a 576 m thick ice shelf floating on sea
    /// water, whose bottom reflects with an amplitude coefficient of 0.82.
    pub fn moores_bay_simple() -> MediumProfile {
        let bottom = ReflectiveLayer { depth: -576., coefficient: 0.82 };
        MediumProfile::preset("mooresbay_simple", 1.78, 0.46, 34.5, Some(bottom), AttenuationModel::MooresBay)
    }

    fn preset(name: &str, n_ice: f64, delta_n: f64, z_0: f64, bottom: Option<ReflectiveLayer>,
              attenuation: AttenuationModel) -> MediumProfile {
        MediumProfile {
            name: name.to_owned(),
            n_ice,
            delta_n,
            z_0,
            n_air: 1.,
            z_min: bottom.map(|b| b.depth).unwrap_or(DEFAULT_Z_MIN),
            z_max: DEFAULT_Z_MAX,
            bottom,
            attenuation,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The index of refraction of deep ice.
    pub fn n_ice(&self) -> f64 {
        self.n_ice
    }

    pub fn delta_n(&self) -> f64 {
        self.delta_n
    }

    /// The scale depth of the firn, in metres.
    pub fn z_0(&self) -> f64 {
        self.z_0
    }

    /// The index of refraction above the surface.
    pub fn n_air(&self) -> f64 {
        self.n_air
    }

    /// The index of refraction of the ice right at the surface.
    pub fn n_surface(&self) -> f64 {
        self.n_ice - self.delta_n
    }

    /// The valid depth range `(z_min, z_max)`, in metres.
    pub fn depth_range(&self) -> (f64, f64) {
        (self.z_min, self.z_max)
    }

    pub fn bottom(&self) -> Option<ReflectiveLayer> {
        self.bottom
    }

    pub fn attenuation_model(&self) -> AttenuationModel {
        self.attenuation
    }

    /// Whether the ice has the same index of refraction at every depth.
    pub fn is_uniform(&self) -> bool {
        self.delta_n == 0.
    }

    pub fn contains(&self, z: f64) -> bool {
        z >= self.z_min && z <= self.z_max
    }

    pub fn check_depth(&self, z: f64) -> Result<()> {
        if self.contains(z) {
            Ok(())
        } else {
            Err(RayTracingError::out_of_domain("depth", z, self.z_min, self.z_max))
        }
    }

    /// The index of refraction at depth `z`.
    pub fn index_of_refraction(&self, z: f64) -> Result<f64> {
        self.check_depth(z)?;
        Ok(self.n_at(z))
    }

    /// The vertical gradient of the index of refraction, `dn/dz`, at depth
    /// `z`. It is negative in the ice: the index grows with depth.
    pub fn gradient(&self, z: f64) -> Result<f64> {
        self.check_depth(z)?;

        if z > 0. {
            Ok(0.)
        } else {
            Ok(-self.excess_at(z) / self.z_0)
        }
    }

    /// The inverse of the profile: the depth at which the ice has index `n`.
    /// This is only defined for `n` in `[n_surface, n_ice)`, and not at all
    /// for uniform ice.
    pub fn depth_of_index(&self, n: f64) -> Result<f64> {
        if self.is_uniform() || n < self.n_surface() || n >= self.n_ice {
            return Err(RayTracingError::out_of_domain("index of refraction", n, self.n_surface(), self.n_ice));
        }

        let z = self.z_0 * ((self.n_ice - n) / self.delta_n).ln();
        self.check_depth(z)?;
        Ok(z)
    }

    /// The attenuation length in metres at depth `z` and frequency
    /// `frequency` (GHz). Above the surface nothing is attenuated.
    pub fn attenuation_length(&self, z: f64, frequency: f64) -> Result<f64> {
        self.check_depth(z)?;

        if !(frequency > 0.) || !frequency.is_finite() {
            return Err(RayTracingError::out_of_domain("frequency", frequency, 0., f64::INFINITY));
        }

        if z > 0. {
            return Ok(f64::INFINITY);
        }

        Ok(self.attenuation.attenuation_length(z, frequency))
    }

    /// The depth at which a ray with parameter `p` turns over, if it does so
    /// inside the ice. A ray with `p < n_surface` reaches the surface first.
    pub fn turning_depth(&self, p: f64) -> Option<f64> {
        if self.is_uniform() || p < self.n_surface() || p >= self.n_ice {
            None
        } else {
            Some(self.z_0 * ((self.n_ice - p) / self.delta_n).ln())
        }
    }

    /// Integrate a ray with parameter `p` between depths `z_a` and `z_b`,
    /// both in the ice. The ray must not turn over strictly between the two
    /// depths; either of them may be the turning depth itself.
    ///
    /// With `s = sqrt(n_ice^2 - p^2)` and `w = sqrt(n^2 - p^2)`, the
    /// exponential profile integrates in closed form:
    ///
    /// ```text
    /// F(z) = [ln(n_ice n - p^2 + s w) - ln(n_ice - n)] / s
    /// H(z) = n_ice F - ln(n + w)
    /// K(z) = n_ice^2 F - n_ice ln(n + w) - w
    /// ```
    ///
    /// and the horizontal distance, path length and travel time are `p z_0`,
    /// `z_0` and `z_0 / c` times the differences of F, H and K between the
    /// lower and upper ends.
    pub fn ray_segment(&self, p: f64, z_a: f64, z_b: f64) -> RaySegment {
        let (lo, hi) = if z_a < z_b { (z_a, z_b) } else { (z_b, z_a) };

        if hi == lo {
            return RaySegment::default();
        }

        let s = (self.n_ice * self.n_ice - p * p).sqrt();

        if self.is_uniform() {
            let dz = hi - lo;
            let length = dz * self.n_ice / s;

            return RaySegment {
                horizontal: dz * p / s,
                length,
                time: length * self.n_ice / SPEED_LIGHT,
            };
        }

        let (f_lo, h_lo, k_lo) = self.primitives(p, s, lo);
        let (f_hi, h_hi, k_hi) = self.primitives(p, s, hi);

        RaySegment {
            horizontal: p * self.z_0 * (f_lo - f_hi),
            length: self.z_0 * (h_lo - h_hi),
            time: self.z_0 / SPEED_LIGHT * (k_lo - k_hi),
        }
    }

    fn primitives(&self, p: f64, s: f64, z: f64) -> (f64, f64, f64) {
        let a = self.n_ice;
        let n = self.n_at(z);
        let w = (n * n - p * p).max(0.).sqrt();
        let f = ((a * n - p * p + s * w).ln() - self.ln_excess_at(z)) / s;
        let g = (n + w).ln();
        (f, a * f - g, a * a * f - a * g - w)
    }

    /// `n(z)` without the domain check.
    pub(crate) fn n_at(&self, z: f64) -> f64 {
        if z > 0. {
            self.n_air
        } else {
            self.n_ice - self.excess_at(z)
        }
    }

    /// `n_ice - n(z)` in the ice, computed without cancellation.
    pub(crate) fn excess_at(&self, z: f64) -> f64 {
        self.delta_n * (z / self.z_0).exp()
    }

    /// `ln(n_ice - n(z))` in the ice, exact even where the excess underflows.
    pub(crate) fn ln_excess_at(&self, z: f64) -> f64 {
        self.delta_n.ln() + z / self.z_0
    }
}


/// Builder for `MediumProfile`s. Obtain one from
/// `MediumProfile::exponential` or `MediumProfile::uniform`.
#[derive(Clone, Debug, PartialEq)]
pub struct MediumBuilder {
    name: String,
    n_ice: f64,
    delta_n: f64,
    z_0: f64,
    n_air: f64,
    z_min: f64,
    z_max: f64,
    bottom: Option<ReflectiveLayer>,
    attenuation: AttenuationModel,
}


impl MediumBuilder {
    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_owned();
        self
    }

    /// Alter the depth range over which the medium is defined.
    pub fn depth_range(mut self, z_min: f64, z_max: f64) -> Self {
        self.z_min = z_min;
        self.z_max = z_max;
        self
    }

    /// Add a reflective layer at `depth` (negative, metres). The medium ends
    /// there, so the lower end of the depth range is moved up to it.
    pub fn reflective_bottom(mut self, depth: f64, coefficient: f64) -> Self {
        self.bottom = Some(ReflectiveLayer { depth, coefficient });
        self
    }

    pub fn attenuation(mut self, model: AttenuationModel) -> Self {
        self.attenuation = model;
        self
    }

    /// Alter the index of refraction above the surface.
    pub fn air_index(mut self, n_air: f64) -> Self {
        self.n_air = n_air;
        self
    }

    /// Validate the parameters and create the medium.
    ///
    /// ## Errors
    ///
    /// Returns a `Configuration` error if any parameter is non-finite, if the
    /// scale depth is not positive, if `delta_n` is negative, if the surface
    /// index would fall below 1, if the depth range does not straddle the
    /// surface, or if the bottom layer lies outside the depth range or has a
    /// coefficient outside [0, 1].
    pub fn finish(self) -> Result<MediumProfile> {
        let bad = |msg: String| Err(RayTracingError::Configuration(msg));

        for &(what, v) in &[("n_ice", self.n_ice), ("delta_n", self.delta_n), ("z_0", self.z_0),
                            ("n_air", self.n_air), ("z_min", self.z_min), ("z_max", self.z_max)] {
            if !v.is_finite() {
                return bad(format!("{} must be finite, got {}", what, v));
            }
        }

        if !(self.z_0 > 0.) {
            return bad(format!("scale depth z_0 must be positive, got {}", self.z_0));
        }

        if self.delta_n < 0. {
            return bad(format!("delta_n must not be negative, got {} (the index would decrease with depth)",
                               self.delta_n));
        }

        if self.n_ice - self.delta_n < 1. {
            return bad(format!("surface index n_ice - delta_n = {} is below 1", self.n_ice - self.delta_n));
        }

        if !(self.n_air > 0.) {
            return bad(format!("n_air must be positive, got {}", self.n_air));
        }

        if !(self.z_min < 0. && self.z_max >= 0.) {
            return bad(format!("depth range [{}, {}] must straddle the surface", self.z_min, self.z_max));
        }

        let mut z_min = self.z_min;

        if let Some(layer) = self.bottom {
            if !(layer.depth < 0. && layer.depth > self.z_min) {
                return bad(format!("reflective bottom at {} m is outside the depth range [{}, 0]",
                                   layer.depth, self.z_min));
            }

            if !(layer.coefficient >= 0. && layer.coefficient <= 1.) {
                return bad(format!("reflection coefficient must be in [0, 1], got {}", layer.coefficient));
            }

            z_min = layer.depth;
        }

        if let AttenuationModel::Constant(l) = self.attenuation {
            if !(l > 0.) {
                return bad(format!("constant attenuation length must be positive, got {}", l));
            }
        }

        Ok(MediumProfile {
            name: self.name,
            n_ice: self.n_ice,
            delta_n: self.delta_n,
            z_0: self.z_0,
            n_air: self.n_air,
            z_min,
            z_max: self.z_max,
            bottom: self.bottom,
            attenuation: self.attenuation,
        })
    }
}
