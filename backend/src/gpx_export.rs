use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use geo_types::Point;
use gpx::{Gpx, GpxVersion, Track, TrackSegment, Waypoint};

use crate::error::RouteError;
use crate::models::{Coordinate, RouteSource, SelectionResult};

const CREATOR: &str = "messy_routes";

/// GPX 1.1 track of the selected route, base64 encoded. Instructions end up
/// in the track description, one per line.
pub fn encode_route_as_gpx(route: &SelectionResult) -> Result<String, RouteError> {
    let mut gpx = Gpx {
        version: GpxVersion::Gpx11,
        creator: Some(CREATOR.into()),
        ..Default::default()
    };
    let mut track = Track {
        name: Some(track_name(&route.source)),
        ..Default::default()
    };
    if !route.instructions.is_empty() {
        track.description = Some(route.instructions.join("\n"));
    }

    let mut segment = TrackSegment::new();
    for waypoint in route.points.iter().map(to_waypoint) {
        segment.points.push(waypoint);
    }
    track.segments.push(segment);
    gpx.tracks.push(track);

    let mut buffer = Vec::new();
    gpx::write(&gpx, &mut buffer)?;
    Ok(BASE64.encode(buffer))
}

fn track_name(source: &RouteSource) -> String {
    match source {
        RouteSource::Detour { from, to } => format!("{CREATOR} via {from} and {to}"),
        RouteSource::Jitter => format!("{CREATOR} (offline)"),
    }
}

fn to_waypoint(coord: &Coordinate) -> Waypoint {
    Waypoint::new(Point::new(coord.lon, coord.lat))
}
