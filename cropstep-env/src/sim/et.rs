use std::f64::consts::{PI, TAU};

/// Solar constant in MJ/m²/min.
const SOLAR_CONSTANT: f64 = 0.0820;

/// Extraterrestrial radiation (MJ/m²/d) for a latitude in degrees and a day of year.
#[must_use]
pub fn extraterrestrial_radiation(latitude_deg: f64, day_of_year: u32) -> f64 {
    let phi = latitude_deg.clamp(-89.0, 89.0).to_radians();
    let j = f64::from(day_of_year);
    let inverse_distance = 1.0 + 0.033 * (TAU * j / 365.0).cos();
    let declination = 0.409 * (TAU * j / 365.0 - 1.39).sin();
    let sunset_angle = (-phi.tan() * declination.tan()).clamp(-1.0, 1.0).acos();
    (24.0 * 60.0 / PI)
        * SOLAR_CONSTANT
        * inverse_distance
        * (sunset_angle * phi.sin() * declination.sin()
            + phi.cos() * declination.cos() * sunset_angle.sin())
}

/// Hargreaves-Samani reference evapotranspiration in mm/d.
#[must_use]
pub fn hargreaves_et0(tmin: f64, tmax: f64, extraterrestrial_mj: f64) -> f64 {
    let tavg = f64::midpoint(tmin, tmax);
    let range = (tmax - tmin).max(0.0);
    (0.0023 * 0.408 * extraterrestrial_mj * (tavg + 17.8) * range.sqrt()).max(0.0)
}
