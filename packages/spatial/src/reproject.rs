//! Coordinate reprojection between ETRS-TM35FIN and geodetic lat/lon.
//!
//! The population grid source ships projected ETRS-TM35FIN (EPSG:3067)
//! meters while the incident source and the hex grid use geodetic
//! degrees, so the conversion is exposed as its own composable step.
//!
//! Implementation is the standard transverse Mercator series (Snyder,
//! "Map Projections: A Working Manual", eqs. 8-9..8-15 forward and
//! 8-17..8-25 inverse) on the GRS80 ellipsoid. Accuracy is sub-meter
//! anywhere inside the zone, which is far below the source grid's cell
//! edge length.

/// GRS80 semi-major axis, meters.
const A: f64 = 6_378_137.0;
/// GRS80 flattening.
const F: f64 = 1.0 / 298.257_222_101;
/// Central meridian of the TM35 zone, degrees.
const LON0_DEG: f64 = 27.0;
/// TM35FIN scale factor at the central meridian.
const K0: f64 = 0.9996;
/// TM35FIN false easting, meters.
const FALSE_EASTING: f64 = 500_000.0;

/// First eccentricity squared.
const fn e2() -> f64 {
    F * (2.0 - F)
}

/// Second eccentricity squared.
const fn ep2() -> f64 {
    e2() / (1.0 - e2())
}

/// Meridian arc length from the equator to latitude `phi` (radians).
fn meridian_arc(phi: f64) -> f64 {
    let e2 = e2();
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    A * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
        - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
        + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
        - (35.0 * e6 / 3072.0) * (6.0 * phi).sin())
}

/// Projects geodetic WGS84/ETRS89 degrees to TM35FIN (easting, northing)
/// meters.
#[must_use]
pub fn wgs84_to_tm35(lat: f64, lon: f64) -> (f64, f64) {
    let e2 = e2();
    let ep2 = ep2();
    let phi = lat.to_radians();
    let dlam = (lon - LON0_DEG).to_radians();

    let sin_phi = phi.sin();
    let cos_phi = phi.cos();
    let n = A / (1.0 - e2 * sin_phi * sin_phi).sqrt();
    let t = (phi.tan()) * (phi.tan());
    let c = ep2 * cos_phi * cos_phi;
    let a = dlam * cos_phi;

    let a2 = a * a;
    let a3 = a2 * a;
    let a4 = a2 * a2;
    let a5 = a4 * a;
    let a6 = a4 * a2;

    let easting = FALSE_EASTING
        + K0 * n
            * (a + (1.0 - t + c) * a3 / 6.0
                + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a5 / 120.0);

    let northing = K0
        * (meridian_arc(phi)
            + n * phi.tan()
                * (a2 / 2.0
                    + (5.0 - t + 9.0 * c + 4.0 * c * c) * a4 / 24.0
                    + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a6 / 720.0));

    (easting, northing)
}

/// Unprojects TM35FIN (easting, northing) meters to geodetic (lat, lon)
/// degrees.
#[must_use]
pub fn tm35_to_wgs84(easting: f64, northing: f64) -> (f64, f64) {
    let e2 = e2();
    let ep2 = ep2();
    let e4 = e2 * e2;
    let e6 = e4 * e2;

    // Footpoint latitude from the rectifying series.
    let m = northing / K0;
    let mu = m / (A * (1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));
    let e1 = (1.0 - (1.0 - e2).sqrt()) / (1.0 + (1.0 - e2).sqrt());
    let e1_2 = e1 * e1;
    let e1_3 = e1_2 * e1;
    let e1_4 = e1_2 * e1_2;
    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1_3 / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1_2 / 16.0 - 55.0 * e1_4 / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1_3 / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1_4 / 512.0) * (8.0 * mu).sin();

    let sin_phi1 = phi1.sin();
    let cos_phi1 = phi1.cos();
    let tan_phi1 = phi1.tan();
    let c1 = ep2 * cos_phi1 * cos_phi1;
    let t1 = tan_phi1 * tan_phi1;
    let n1 = A / (1.0 - e2 * sin_phi1 * sin_phi1).sqrt();
    let r1 = A * (1.0 - e2) / (1.0 - e2 * sin_phi1 * sin_phi1).powf(1.5);
    let d = (easting - FALSE_EASTING) / (n1 * K0);

    let d2 = d * d;
    let d3 = d2 * d;
    let d4 = d2 * d2;
    let d5 = d4 * d;
    let d6 = d4 * d2;

    let phi = phi1
        - (n1 * tan_phi1 / r1)
            * (d2 / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d4 / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * ep2 - 3.0 * c1 * c1)
                    * d6
                    / 720.0);

    let lam = (d - (1.0 + 2.0 * t1 + c1) * d3 / 6.0
        + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1) * d5 / 120.0)
        / cos_phi1;

    (phi.to_degrees(), LON0_DEG + lam.to_degrees())
}
