//! Vehicle state used to gate map updates.
//!
//! Measurements taken while the vehicle is taking off or landing are not
//! integrated.

use akasha_map::Point3;

/// Flight phase reported by the vehicle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FlightState {
    #[default]
    Landed,
    TakingOff,
    Flying,
    Landing,
}

impl FlightState {
    /// True in every phase except `Landed`.
    pub fn is_airborne(&self) -> bool {
        !matches!(self, FlightState::Landed)
    }
}

/// Latest diagnostics from the vehicle.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VehicleDiagnostics {
    pub flight_state: FlightState,
}

/// Latest known robot state in the map frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RobotState {
    /// Sensor position
    pub position: Point3,
    /// Measured height above ground, if a rangefinder is available
    pub height: Option<f64>,
    /// Latest diagnostics, if any were received
    pub diagnostics: Option<VehicleDiagnostics>,
}

impl RobotState {
    /// State with only a position.
    pub fn at(position: Point3) -> Self {
        Self {
            position,
            height: None,
            diagnostics: None,
        }
    }

    /// True if diagnostics report any airborne phase.
    pub fn is_airborne(&self) -> bool {
        self.diagnostics
            .is_some_and(|d| d.flight_state.is_airborne())
    }
}

/// Whether a measurement may be integrated given the latest diagnostics.
///
/// Without diagnostics there is nothing to gate on and every measurement
/// is accepted.
pub fn may_integrate(latest: Option<&VehicleDiagnostics>) -> bool {
    match latest {
        None => true,
        Some(d) => !matches!(d.flight_state, FlightState::TakingOff | FlightState::Landing),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diag(flight_state: FlightState) -> VehicleDiagnostics {
        VehicleDiagnostics { flight_state }
    }

    #[test]
    fn test_may_integrate() {
        assert!(may_integrate(None));
        assert!(may_integrate(Some(&diag(FlightState::Landed))));
        assert!(may_integrate(Some(&diag(FlightState::Flying))));
        assert!(!may_integrate(Some(&diag(FlightState::TakingOff))));
        assert!(!may_integrate(Some(&diag(FlightState::Landing))));
    }

    #[test]
    fn test_airborne() {
        let mut state = RobotState::at(Point3::ZERO);
        assert!(!state.is_airborne());
        state.diagnostics = Some(diag(FlightState::Flying));
        assert!(state.is_airborne());
        state.diagnostics = Some(diag(FlightState::Landed));
        assert!(!state.is_airborne());
    }
}
