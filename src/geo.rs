//! Coordinate helpers: great-circle distance and bearing, S2 cell ids,
//! and conversion between WGS84 and a scene-local frame anchored at the
//! center of an S2 cell.
//!
//! The local frame follows game-engine conventions: x = east, y = up,
//! z = north, in meters. It is a tangent-plane approximation, accurate
//! to well under a meter within a level-19 cell's neighbourhood.

use crate::types::LatLng;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_010.0;

/// Cell level used to anchor scenes (~18 m cells).
pub const S2_CELL_LEVEL: u8 = 19;

/// Deepest S2 level (leaf cells).
pub const MAX_LEVEL: u8 = 30;

const POS_BITS: u32 = 2 * MAX_LEVEL as u32 + 1;
const MAX_SIZE: u32 = 1 << MAX_LEVEL;

const SWAP_MASK: u8 = 0x01;
const INVERT_MASK: u8 = 0x02;

/// Hilbert position of each (i, j) child quadrant, per orientation.
const IJ_TO_POS: [[u8; 4]; 4] = [[0, 1, 3, 2], [0, 3, 1, 2], [2, 3, 1, 0], [2, 1, 3, 0]];
/// Inverse of `IJ_TO_POS`.
const POS_TO_IJ: [[u8; 4]; 4] = [[0, 1, 3, 2], [0, 2, 3, 1], [3, 2, 0, 1], [3, 1, 0, 2]];
const POS_TO_ORIENTATION: [u8; 4] = [SWAP_MASK, 0, 0, INVERT_MASK | SWAP_MASK];

/// Haversine distance in meters.
pub fn meters_between(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let dphi = phi2 - phi1;
    let dlambda = (lng2 - lng1).to_radians();
    let a = (dphi * 0.5).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda * 0.5).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().min(1.0).asin()
}

/// Initial great-circle bearing from the first point to the second, in
/// degrees clockwise from north, in [0, 360).
pub fn angle_between(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let dlambda = (lng2 - lng1).to_radians();
    let y = dlambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * dlambda.cos();
    let bearing = y.atan2(x).to_degrees().rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs.
    if bearing >= 360.0 {
        0.0
    } else {
        bearing
    }
}

fn lat_lng_to_xyz(lat: f64, lng: f64) -> [f64; 3] {
    let (phi, theta) = (lat.to_radians(), lng.to_radians());
    [phi.cos() * theta.cos(), phi.cos() * theta.sin(), phi.sin()]
}

fn xyz_to_lat_lng(p: [f64; 3]) -> LatLng {
    let lat = p[2].atan2((p[0] * p[0] + p[1] * p[1]).sqrt());
    let lng = p[1].atan2(p[0]);
    LatLng::new(lat.to_degrees(), lng.to_degrees())
}

fn xyz_to_face_uv(p: [f64; 3]) -> (u8, f64, f64) {
    let [x, y, z] = p;
    let (ax, ay, az) = (x.abs(), y.abs(), z.abs());
    let mut face = if ax >= ay && ax >= az {
        0
    } else if ay >= az {
        1
    } else {
        2
    };
    if p[face as usize] < 0.0 {
        face += 3;
    }
    let (u, v) = match face {
        0 => (y / x, z / x),
        1 => (-x / y, z / y),
        2 => (-x / z, -y / z),
        3 => (z / x, y / x),
        4 => (z / y, -x / y),
        _ => (-y / z, -x / z),
    };
    (face, u, v)
}

fn face_uv_to_xyz(face: u8, u: f64, v: f64) -> [f64; 3] {
    match face {
        0 => [1.0, u, v],
        1 => [-u, 1.0, v],
        2 => [-u, -v, 1.0],
        3 => [-1.0, -v, -u],
        4 => [v, -1.0, -u],
        _ => [v, u, -1.0],
    }
}

/// Quadratic projection from cube-face coordinates to cell-space.
fn uv_to_st(u: f64) -> f64 {
    if u >= 0.0 {
        0.5 * (1.0 + 3.0 * u).sqrt()
    } else {
        1.0 - 0.5 * (1.0 - 3.0 * u).sqrt()
    }
}

fn st_to_uv(s: f64) -> f64 {
    if s >= 0.5 {
        (4.0 * s * s - 1.0) / 3.0
    } else {
        (1.0 - 4.0 * (1.0 - s) * (1.0 - s)) / 3.0
    }
}

fn st_to_ij(s: f64) -> u32 {
    let ij = (MAX_SIZE as f64 * s).floor();
    ij.clamp(0.0, (MAX_SIZE - 1) as f64) as u32
}

fn leaf_id(face: u8, i: u32, j: u32) -> u64 {
    let mut id = (face as u64) << POS_BITS;
    let mut orientation = face & SWAP_MASK;
    for k in (0..MAX_LEVEL as u32).rev() {
        let ij = ((((i >> k) & 1) << 1) | ((j >> k) & 1)) as usize;
        let pos = IJ_TO_POS[orientation as usize][ij];
        id |= (pos as u64) << (2 * k + 1);
        orientation ^= POS_TO_ORIENTATION[pos as usize];
    }
    id | 1
}

fn lsb_for_level(level: u8) -> u64 {
    1u64 << (2 * (MAX_LEVEL - level) as u32)
}

/// Whether `cell_id` names an S2 cell: face below 6 and the lowest set bit
/// at an even position.
pub fn is_valid_cell(cell_id: u64) -> bool {
    (cell_id >> POS_BITS) < 6 && (cell_id & cell_id.wrapping_neg() & 0x1555_5555_5555_5555) != 0
}

/// Level of a cell id, or `None` if the id is not a valid cell.
pub fn cell_level(cell_id: u64) -> Option<u8> {
    if !is_valid_cell(cell_id) {
        return None;
    }
    Some(MAX_LEVEL - (cell_id.trailing_zeros() / 2) as u8)
}

/// Ancestor of `cell_id` at `level` (no-op if the cell is not deeper, or
/// not a valid cell).
pub fn cell_parent(cell_id: u64, level: u8) -> u64 {
    match cell_level(cell_id) {
        Some(current) if level < current => {
            let lsb = lsb_for_level(level);
            (cell_id & lsb.wrapping_neg()) | lsb
        }
        _ => cell_id,
    }
}

/// S2 cell id containing the coordinates, at `level` (clamped to 0..=30).
pub fn cell_id_for_wgs(lat: f64, lng: f64, level: u8) -> u64 {
    let (face, u, v) = xyz_to_face_uv(lat_lng_to_xyz(lat, lng));
    let i = st_to_ij(uv_to_st(u));
    let j = st_to_ij(uv_to_st(v));
    cell_parent(leaf_id(face, i, j), level.min(MAX_LEVEL))
}

/// Center of a cell, or `None` if the id is not a valid cell.
pub fn cell_center(cell_id: u64) -> Option<LatLng> {
    let level = cell_level(cell_id)?;
    let face = (cell_id >> POS_BITS) as u8;
    let mut orientation = face & SWAP_MASK;
    let (mut i, mut j) = (0u64, 0u64);
    for l in 1..=level as u32 {
        let pos = ((cell_id >> (POS_BITS - 2 * l)) & 3) as usize;
        let ij = POS_TO_IJ[orientation as usize][pos];
        i = (i << 1) | (ij >> 1) as u64;
        j = (j << 1) | (ij & 1) as u64;
        orientation ^= POS_TO_ORIENTATION[pos];
    }
    // Cell spans [i, i + 1) at its own level; center in leaf units / 2^30.
    let scale = (1u64 << level) as f64;
    let s = (i as f64 + 0.5) / scale;
    let t = (j as f64 + 0.5) / scale;
    Some(xyz_to_lat_lng(face_uv_to_xyz(face, st_to_uv(s), st_to_uv(t))))
}

fn local_origin(cell_id: u64) -> Option<LatLng> {
    let origin = cell_center(cell_id);
    if origin.is_none() {
        log::warn!("Invalid S2 cell id {:#018x}", cell_id);
    }
    origin
}

/// WGS84 position to scene coordinates [x east, y up, z north] relative to
/// the center of `cell_id`. All NaN if `cell_id` is not a valid cell.
pub fn wgs_to_local(lat: f64, lng: f64, alt: f64, cell_id: u64) -> [f64; 3] {
    let Some(origin) = local_origin(cell_id) else {
        return [f64::NAN; 3];
    };
    let north = (lat - origin.latitude).to_radians() * EARTH_RADIUS_M;
    let dlng = (lng - origin.longitude + 540.0).rem_euclid(360.0) - 180.0;
    let east = dlng.to_radians() * EARTH_RADIUS_M * origin.latitude.to_radians().cos();
    [east, alt, north]
}

/// Inverse of [`wgs_to_local`]: returns [latitude, longitude, altitude].
/// All NaN if `cell_id` is not a valid cell.
pub fn local_to_wgs(local: [f64; 3], cell_id: u64) -> [f64; 3] {
    let Some(origin) = local_origin(cell_id) else {
        return [f64::NAN; 3];
    };
    let [east, up, north] = local;
    let lat = origin.latitude + (north / EARTH_RADIUS_M).to_degrees();
    let cos_lat = origin.latitude.to_radians().cos();
    let mut lng = origin.longitude + (east / (EARTH_RADIUS_M * cos_lat)).to_degrees();
    if lng > 180.0 {
        lng -= 360.0;
    } else if lng < -180.0 {
        lng += 360.0;
    }
    [lat, lng, up]
}
