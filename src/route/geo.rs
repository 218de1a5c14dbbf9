//! Great-circle helpers on a spherical Earth.

use crate::weather::Location;

/// Mean Earth radius (km, IUGG).
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Haversine distance in kilometres.
pub fn haversine_km(a: Location, b: Location) -> f64 {
    let (phi1, phi2) = (a.latitude.to_radians(), b.latitude.to_radians());
    let d_phi = phi2 - phi1;
    let d_lambda = (b.longitude - a.longitude).to_radians();

    let h = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Great-circle midpoint, longitude normalised to [-180, 180).
pub fn midpoint(a: Location, b: Location) -> Location {
    let (phi1, phi2) = (a.latitude.to_radians(), b.latitude.to_radians());
    let lambda1 = a.longitude.to_radians();
    let d_lambda = (b.longitude - a.longitude).to_radians();

    let bx = phi2.cos() * d_lambda.cos();
    let by = phi2.cos() * d_lambda.sin();
    let phi_m = (phi1.sin() + phi2.sin()).atan2(((phi1.cos() + bx).powi(2) + by.powi(2)).sqrt());
    let lambda_m = lambda1 + by.atan2(phi1.cos() + bx);

    let lon = (lambda_m.to_degrees() + 540.0).rem_euclid(360.0) - 180.0;
    Location::new(phi_m.to_degrees(), lon)
}
