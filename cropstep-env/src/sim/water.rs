use crate::inputs::SoilProfile;

/// Maximum daily fraction of a layer's extractable water that roots can take up.
const UPTAKE_RATE: f64 = 0.10;
/// Depth from which bare-soil evaporation draws water.
const EVAPORATION_DEPTH_CM: f64 = 15.0;
/// Air-dry water content as a fraction of the lower limit.
const AIR_DRY_FRACTION: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
struct LayerState {
    top_cm: f64,
    bottom_cm: f64,
    lower: f64,
    upper: f64,
    saturation: f64,
    root_factor: f64,
    theta: f64,
}

impl LayerState {
    /// Millimetres of water per unit of volumetric content.
    fn mm_per_unit(&self) -> f64 {
        (self.bottom_cm - self.top_cm) * 10.0
    }

    /// Fraction of the layer above `depth_cm`.
    fn fraction_above(&self, depth_cm: f64) -> f64 {
        if depth_cm <= self.top_cm {
            0.0
        } else {
            ((depth_cm - self.top_cm) / (self.bottom_cm - self.top_cm)).min(1.0)
        }
    }
}

/// Layered tipping-bucket soil water balance.
#[derive(Debug, Clone, PartialEq)]
pub struct SoilWater {
    layers: Vec<LayerState>,
}

impl SoilWater {
    #[must_use]
    pub fn new(profile: &SoilProfile) -> Self {
        let mut top_cm = 0.0;
        let layers = profile
            .layers
            .iter()
            .map(|layer| {
                let state = LayerState {
                    top_cm,
                    bottom_cm: layer.bottom_cm,
                    lower: layer.lower_limit,
                    upper: layer.drained_upper,
                    saturation: layer.saturation,
                    root_factor: layer.root_growth_factor,
                    theta: layer.initial_water.clamp(0.0, layer.saturation),
                };
                top_cm = layer.bottom_cm;
                state
            })
            .collect();
        Self { layers }
    }

    /// Volumetric water content per layer, top first.
    #[must_use]
    pub fn contents(&self) -> Vec<f64> {
        self.layers.iter().map(|layer| layer.theta).collect()
    }

    /// Total stored water in mm.
    #[must_use]
    pub fn total_mm(&self) -> f64 {
        self.layers
            .iter()
            .map(|layer| layer.theta * layer.mm_per_unit())
            .sum()
    }

    /// Infiltrate `mm` from the surface, filling layers to saturation top-down.
    /// Returns water that passes below the profile.
    pub fn infiltrate(&mut self, mm: f64) -> f64 {
        let mut remaining = mm.max(0.0);
        for layer in &mut self.layers {
            if remaining <= 0.0 {
                break;
            }
            let room = (layer.saturation - layer.theta).max(0.0) * layer.mm_per_unit();
            let taken = remaining.min(room);
            layer.theta += taken / layer.mm_per_unit();
            remaining -= taken;
        }
        remaining
    }

    /// Drain water above field capacity downwards. Returns deep drainage in mm.
    pub fn drain(&mut self, rate: f64) -> f64 {
        let rate = rate.clamp(0.0, 1.0);
        let mut carry = 0.0;
        for layer in &mut self.layers {
            layer.theta += carry / layer.mm_per_unit();
            let mut outflow = (layer.theta - layer.upper).max(0.0) * rate;
            if layer.theta - outflow > layer.saturation {
                outflow = layer.theta - layer.saturation;
            }
            layer.theta -= outflow;
            carry = outflow * layer.mm_per_unit();
        }
        carry
    }

    /// Evaporate up to `demand_mm` from the surface layers. Returns the actual amount.
    pub fn evaporate(&mut self, demand_mm: f64) -> f64 {
        let mut remaining = demand_mm.max(0.0);
        for layer in self
            .layers
            .iter_mut()
            .filter(|layer| layer.top_cm < EVAPORATION_DEPTH_CM)
        {
            let air_dry = layer.lower * AIR_DRY_FRACTION;
            let available = (layer.theta - air_dry).max(0.0) * layer.mm_per_unit();
            let taken = remaining.min(available);
            layer.theta -= taken / layer.mm_per_unit();
            remaining -= taken;
        }
        demand_mm.max(0.0) - remaining
    }

    /// Root water uptake from layers above `root_depth_cm`. Returns the actual amount.
    pub fn uptake(&mut self, demand_mm: f64, root_depth_cm: f64) -> f64 {
        let supplies: Vec<f64> = self
            .layers
            .iter()
            .map(|layer| {
                let extractable = (layer.theta - layer.lower).max(0.0) * layer.mm_per_unit();
                extractable * layer.fraction_above(root_depth_cm) * layer.root_factor * UPTAKE_RATE
            })
            .collect();
        let supply: f64 = supplies.iter().sum();
        let demand = demand_mm.max(0.0);
        if supply <= 0.0 || demand <= 0.0 {
            return 0.0;
        }
        let actual = demand.min(supply);
        let share = actual / supply;
        for (layer, layer_supply) in self.layers.iter_mut().zip(supplies) {
            layer.theta -= layer_supply * share / layer.mm_per_unit();
        }
        actual
    }

    /// Plant-available water in the root zone as a fraction of its capacity.
    #[must_use]
    pub fn available_fraction(&self, root_depth_cm: f64) -> f64 {
        let depth = root_depth_cm.max(self.layers.first().map_or(0.0, |layer| layer.bottom_cm));
        let (available, capacity) = self.layers.iter().fold((0.0, 0.0), |(avail, cap), layer| {
            let weight = layer.fraction_above(depth) * layer.mm_per_unit();
            (
                avail + (layer.theta - layer.lower).max(0.0) * weight,
                cap + (layer.upper - layer.lower) * weight,
            )
        });
        if capacity <= 0.0 {
            0.0
        } else {
            (available / capacity).clamp(0.0, 1.0)
        }
    }
}

/// SCS curve-number runoff for a daily rain amount.
#[must_use]
pub fn runoff(rain_mm: f64, curve_number: f64) -> f64 {
    if rain_mm <= 0.0 || curve_number <= 0.0 {
        return 0.0;
    }
    let retention = 25_400.0 / curve_number.min(100.0) - 254.0;
    let initial_abstraction = 0.2 * retention;
    if rain_mm <= initial_abstraction {
        0.0
    } else {
        (rain_mm - initial_abstraction).powi(2) / (rain_mm + 0.8 * retention)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn soil() -> SoilWater {
        SoilWater::new(&SoilProfile::red_sandy_loam("T"))
    }

    #[test]
    fn infiltration_and_drainage_conserve_water() {
        let mut water = soil();
        let before = water.total_mm();
        let passed = water.infiltrate(60.0);
        let drained = water.drain(0.6);
        assert!((water.total_mm() + passed + drained - before - 60.0).abs() < 1e-9);
        assert!(water.contents()[0] <= 0.33 + 1e-12);
    }

    #[test]
    fn uptake_is_limited_by_supply() {
        let mut water = soil();
        let shallow = water.uptake(50.0, 10.0);
        assert!(shallow > 0.0 && shallow < 50.0);
        let mut water = soil();
        assert!((water.uptake(0.5, 100.0) - 0.5).abs() < 1e-12);
        assert!(water.uptake(5.0, 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn evaporation_stops_at_air_dry() {
        let mut water = soil();
        let taken = water.evaporate(1_000.0);
        assert!(taken < 1_000.0);
        assert!(water.contents()[0] >= 0.04 - 1e-12);
        assert!(water.contents()[3] > 0.19);
    }

    #[test]
    fn curve_number_runoff() {
        assert!(runoff(5.0, 65.0).abs() < f64::EPSILON);
        let heavy = runoff(100.0, 75.0);
        assert!(heavy > 10.0 && heavy < 60.0, "{heavy}");
        assert!(runoff(100.0, 85.0) > heavy);
    }
}
