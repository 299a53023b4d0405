#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Hexagonal grid indexing for incident coordinates.
//!
//! Wraps H3 cell assignment at one fixed resolution. The forward mapping
//! (coordinate -> cell) is deterministic and many-to-one; the reverse
//! mapping (cell -> centroid) is a pure function of the cell id. Both
//! directions are exercised by the risk-table builder: assignment during
//! aggregation, centroid recovery when attaching coordinates to grouped
//! rows.
//!
//! Inputs must be WGS84 degrees (EPSG:4326). Reprojection of any other
//! coordinate reference system is an explicit upstream step, never assumed
//! here.

use h3o::{CellIndex, LatLng, Resolution};

/// Default H3 resolution for the risk grid.
///
/// Resolution 8 is roughly neighborhood sized (~460m edge), which is the
/// scale patrol recommendations are made at.
pub const DEFAULT_RESOLUTION: u8 = 8;

/// Coordinate reference system declared by an incident dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinateSystem {
    /// EPSG:4326, longitude/latitude in degrees. The only system the grid
    /// indexes directly.
    Wgs84,
    /// The dataset did not declare a CRS.
    Unspecified,
    /// Any other declared CRS (e.g. `EPSG:3857`).
    Other(String),
}

/// Errors from grid configuration and cell assignment.
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    /// The configured resolution is outside the valid H3 range (0-15).
    #[error("invalid grid resolution {0}: expected 0-15")]
    InvalidResolution(u8),

    /// A coordinate pair is outside the valid WGS84 range.
    #[error("invalid WGS84 coordinate ({latitude}, {longitude})")]
    InvalidCoordinate {
        /// The offending latitude.
        latitude: f64,
        /// The offending longitude.
        longitude: f64,
    },

    /// The dataset declares a CRS other than EPSG:4326.
    #[error("unsupported coordinate system '{0}': reproject to EPSG:4326 before indexing")]
    UnsupportedCrs(String),
}

/// Grid indexer fixed to one H3 resolution.
///
/// Construct once per pipeline run; the resolution never changes for the
/// lifetime of the indexer, so every cell id it produces or reverses is
/// comparable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridIndexer {
    resolution: Resolution,
}

impl GridIndexer {
    /// Creates an indexer at the given H3 resolution.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::InvalidResolution`] if `resolution` is outside
    /// the H3 range 0-15.
    pub fn new(resolution: u8) -> Result<Self, GridError> {
        let resolution = Resolution::try_from(resolution)
            .map_err(|_| GridError::InvalidResolution(resolution))?;
        Ok(Self { resolution })
    }

    /// Returns the configured resolution.
    #[must_use]
    pub const fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Maps a WGS84 coordinate to its hexagonal cell.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::InvalidCoordinate`] if the pair is outside the
    /// valid latitude/longitude range.
    pub fn to_cell(&self, latitude: f64, longitude: f64) -> Result<CellIndex, GridError> {
        // H3 accepts any finite coordinate and wraps it onto the sphere, so
        // the degree range has to be enforced here or an out-of-range pair
        // would index into a plausible-looking but wrong cell.
        if !((-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude)) {
            return Err(GridError::InvalidCoordinate {
                latitude,
                longitude,
            });
        }
        let coord = LatLng::new(latitude, longitude).map_err(|_| GridError::InvalidCoordinate {
            latitude,
            longitude,
        })?;
        Ok(coord.to_cell(self.resolution))
    }

    /// Returns the centroid (latitude, longitude) of a cell.
    ///
    /// This is a pure function of the cell id: the representative point of
    /// the hexagon, not an observed incident location.
    #[must_use]
    pub fn to_centroid(cell: CellIndex) -> (f64, f64) {
        let coord = LatLng::from(cell);
        (coord.lat(), coord.lng())
    }

    /// Validates a dataset's declared coordinate system before indexing.
    ///
    /// An unspecified CRS logs a warning and proceeds with the documented
    /// default (EPSG:4326). Any other declared system is rejected: silent
    /// indexing of projected coordinates would produce a plausible-looking
    /// but meaningless grid.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::UnsupportedCrs`] for any declared CRS other
    /// than EPSG:4326.
    pub fn validate_crs(crs: &CoordinateSystem) -> Result<(), GridError> {
        match crs {
            CoordinateSystem::Wgs84 => Ok(()),
            CoordinateSystem::Unspecified => {
                log::warn!("CRS missing; assuming EPSG:4326");
                Ok(())
            }
            CoordinateSystem::Other(name) => Err(GridError::UnsupportedCrs(name.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignment_is_deterministic() {
        let indexer = GridIndexer::new(8).unwrap();
        let a = indexer.to_cell(36.10, -115.15).unwrap();
        let b = indexer.to_cell(36.10, -115.15).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn centroid_stays_within_one_cell_radius() {
        // Resolution 8 hexagons have ~460m edges, so the centroid of the
        // containing cell is always within ~0.01 degrees of the input.
        let indexer = GridIndexer::new(8).unwrap();
        let cell = indexer.to_cell(36.10, -115.15).unwrap();
        let (lat, lng) = GridIndexer::to_centroid(cell);
        assert!((lat - 36.10).abs() < 0.01);
        assert!((lng - -115.15).abs() < 0.01);
    }

    #[test]
    fn nearby_points_share_a_cell() {
        let indexer = GridIndexer::new(8).unwrap();
        let a = indexer.to_cell(36.1000, -115.1500).unwrap();
        let b = indexer.to_cell(36.1001, -115.1501).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_invalid_resolution() {
        assert!(matches!(
            GridIndexer::new(16),
            Err(GridError::InvalidResolution(16))
        ));
    }

    #[test]
    fn rejects_out_of_range_coordinate() {
        let indexer = GridIndexer::new(8).unwrap();
        assert!(matches!(
            indexer.to_cell(91.0, 0.0),
            Err(GridError::InvalidCoordinate { .. })
        ));
        assert!(matches!(
            indexer.to_cell(36.10, -190.0),
            Err(GridError::InvalidCoordinate { .. })
        ));
        assert!(matches!(
            indexer.to_cell(f64::NAN, -115.15),
            Err(GridError::InvalidCoordinate { .. })
        ));
    }

    #[test]
    fn accepts_coordinates_on_the_range_edges() {
        let indexer = GridIndexer::new(8).unwrap();
        assert!(indexer.to_cell(90.0, 180.0).is_ok());
        assert!(indexer.to_cell(-90.0, -180.0).is_ok());
    }

    #[test]
    fn rejects_projected_crs() {
        let err =
            GridIndexer::validate_crs(&CoordinateSystem::Other("EPSG:3857".to_owned())).unwrap_err();
        assert!(err.to_string().contains("EPSG:3857"));
    }

    #[test]
    fn accepts_unspecified_crs_with_default() {
        assert!(GridIndexer::validate_crs(&CoordinateSystem::Unspecified).is_ok());
    }
}
