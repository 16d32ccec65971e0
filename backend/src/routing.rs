use crate::models::Coordinate;

const EARTH_RADIUS_KM: f64 = 6_371.0;

/// (Δlat, Δlon) offsets in degrees. The first two are applied to the start,
/// the last one to the end.
const START_JITTER: [(f64, f64); 2] = [(0.01, -0.01), (0.005, 0.015)];
const END_JITTER: (f64, f64) = (-0.01, 0.01);

/// Provider-independent fallback path: always 5 points, `start` first and
/// `end` last. Pure and deterministic so the map is never blank.
pub fn jitter_path(start: Coordinate, end: Coordinate) -> Vec<Coordinate> {
    let mut path = Vec::with_capacity(5);
    path.push(start);
    for (d_lat, d_lon) in START_JITTER {
        path.push(start.offset(d_lat, d_lon));
    }
    path.push(end.offset(END_JITTER.0, END_JITTER.1));
    path.push(end);
    path
}

pub fn approximate_distance_km(path: &[Coordinate]) -> f64 {
    path.windows(2).map(|w| haversine_km(w[0], w[1])).sum()
}

pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let sin_dlat = (dlat / 2.0).sin();
    let sin_dlon = (dlon / 2.0).sin();

    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}
