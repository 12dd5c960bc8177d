use std::collections::HashMap;

use glam::DVec2;
use new_string_template::template::Template;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tellus_scene::web_mercator::{lat_lon_to_meters, meters_to_lat_lon};
use tellus_scene::{BoundingSphere, Ellipsoid, Geodetic, Rectangle};

use crate::error::ConfigError;
use crate::tile_key::TileKey;

/// Deepest zoom the tile arithmetic supports without overflowing row/column
/// shifts.
pub const MAX_SUPPORTED_ZOOM: u32 = 30;

fn default_tile_size() -> u32 {
    256
}

fn default_true() -> bool {
    true
}

/// Immutable-after-setup configuration for one tile source.
///
/// Each base url is a template carrying `{x}`, `{y}` and `{z}` replacement
/// tokens; one is picked at random for every tile request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileDatabaseOptions {
    pub bounds: Rectangle,
    pub base_urls: Vec<String>,
    pub minzoom: u32,
    pub maxzoom: u32,
    /// Row origin at the top (XYZ/google) when true, at the bottom (TMS)
    /// when false. Tile keys are always normalized to the google scheme;
    /// the flag only affects the `{y}` substituted into urls.
    #[serde(default = "default_true")]
    pub google_tile_convention: bool,
    #[serde(default = "default_tile_size")]
    pub tile_size: u32,
}

impl Default for TileDatabaseOptions {
    fn default() -> Self {
        Self {
            bounds: Rectangle::MAX_VALUE,
            base_urls: vec![],
            minzoom: 0,
            maxzoom: 18,
            google_tile_convention: true,
            tile_size: 256,
        }
    }
}

/// Per-source quadtree geometry: resolution per zoom, tile bounds/center/
/// radius, projected-meter conversions and url construction.
///
/// Projection is the spherical pseudo-Mercator of `tellus_scene::
/// web_mercator`; read-only after setup and freely shared across tasks.
#[derive(Debug)]
pub struct TileDatabase {
    bounds: Rectangle,
    base_urls: Vec<String>,
    minzoom: u32,
    maxzoom: u32,
    google_tile_convention: bool,
    tile_size: u32,
    origin_meters: DVec2,
    size_meters: DVec2,
    initial_resolution: f64,
    ellipsoid: Ellipsoid,
}

impl TileDatabase {
    pub fn new(options: TileDatabaseOptions) -> Result<Self, ConfigError> {
        if options.base_urls.is_empty() {
            return Err(ConfigError::NoTemplates);
        }
        if options.minzoom > options.maxzoom {
            return Err(ConfigError::ZoomRange {
                minzoom: options.minzoom,
                maxzoom: options.maxzoom,
            });
        }
        if options.maxzoom > MAX_SUPPORTED_ZOOM {
            return Err(ConfigError::ZoomTooDeep {
                maxzoom: options.maxzoom,
                limit: MAX_SUPPORTED_ZOOM,
            });
        }
        if options.tile_size == 0 {
            return Err(ConfigError::ZeroTileSize);
        }

        let bounds = options.bounds;
        let sw = lat_lon_to_meters(&Geodetic::new(bounds.south, bounds.west, 0.0));
        let ne = lat_lon_to_meters(&Geodetic::new(bounds.north, bounds.east, 0.0));
        let size_meters = ne - sw;
        if size_meters.x <= 0.0 || size_meters.y <= 0.0 {
            return Err(ConfigError::EmptyBounds);
        }

        let initial_resolution = size_meters.x / options.tile_size as f64;

        Ok(Self {
            bounds,
            base_urls: options.base_urls,
            minzoom: options.minzoom,
            maxzoom: options.maxzoom,
            google_tile_convention: options.google_tile_convention,
            tile_size: options.tile_size,
            origin_meters: sw,
            size_meters,
            initial_resolution,
            ellipsoid: Ellipsoid::WGS84,
        })
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let options: TileDatabaseOptions =
            serde_json::from_str(json).map_err(|e| ConfigError::Json(e.to_string()))?;
        Self::new(options)
    }

    pub fn bounds(&self) -> Rectangle {
        self.bounds
    }

    pub fn minzoom(&self) -> u32 {
        self.minzoom
    }

    pub fn maxzoom(&self) -> u32 {
        self.maxzoom
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    /// Meters per pixel at `zoom`, halving with every level.
    pub fn resolution_at_zoom(&self, zoom: u32) -> f64 {
        self.initial_resolution / (1u64 << zoom) as f64
    }

    pub fn lat_lon_to_meters(&self, coord: &Geodetic) -> DVec2 {
        lat_lon_to_meters(coord)
    }

    pub fn meters_to_lat_lon(&self, meters: DVec2) -> Geodetic {
        meters_to_lat_lon(meters)
    }

    /// Projected meters to pixel coordinates at `zoom`, pixel origin at the
    /// top-left of the bounds.
    pub fn meters_to_pixels(&self, meters: DVec2, zoom: u32) -> DVec2 {
        let res = self.resolution_at_zoom(zoom);
        let top = self.origin_meters.y + self.size_meters.y;
        DVec2::new((meters.x - self.origin_meters.x) / res, (top - meters.y) / res)
    }

    pub fn pixels_to_meters(&self, pixels: DVec2, zoom: u32) -> DVec2 {
        let res = self.resolution_at_zoom(zoom);
        let top = self.origin_meters.y + self.size_meters.y;
        DVec2::new(
            self.origin_meters.x + pixels.x * res,
            top - pixels.y * res,
        )
    }

    /// Geodetic position of the tile's pixel origin (its northwest corner).
    pub fn tile_lat_lon_origin(&self, tile: &TileKey) -> Geodetic {
        let pixels = DVec2::new(
            (tile.x * self.tile_size) as f64,
            (tile.y * self.tile_size) as f64,
        );
        self.meters_to_lat_lon(self.pixels_to_meters(pixels, tile.level))
    }

    pub fn tile_lat_lon_center(&self, tile: &TileKey) -> Geodetic {
        let pixels = DVec2::new(
            (tile.x as f64 + 0.5) * self.tile_size as f64,
            (tile.y as f64 + 0.5) * self.tile_size as f64,
        );
        self.meters_to_lat_lon(self.pixels_to_meters(pixels, tile.level))
    }

    /// Geographic bounds of a tile, from its origin and the origin of its
    /// opposite-corner neighbor.
    pub fn tile_bounds(&self, tile: &TileKey) -> Rectangle {
        let nw = self.tile_lat_lon_origin(tile);
        let se = self.tile_lat_lon_origin(&tile.opposite_corner());
        Rectangle::new(nw.longitude, se.latitude, se.longitude, nw.latitude)
    }

    /// Half the ECEF chord between the tile's opposite corners; seeds the
    /// page bounding sphere radius.
    pub fn tile_radius(&self, tile: &TileKey) -> f64 {
        let nw = self.tile_lat_lon_origin(tile);
        let se = self.tile_lat_lon_origin(&tile.opposite_corner());
        let a = self.ellipsoid.geodetic_to_ecef(&nw);
        let b = self.ellipsoid.geodetic_to_ecef(&se);
        (b - a).length() * 0.5
    }

    /// Bounding sphere for a tile, centered on the ECEF chord midpoint of
    /// its opposite corners with the half-chord radius, then grown to cover
    /// the surface point at the tile center where the ellipsoid bulges off
    /// the chord.
    pub fn tile_bounding_sphere(&self, tile: &TileKey) -> BoundingSphere {
        let nw = self.ellipsoid.geodetic_to_ecef(&self.tile_lat_lon_origin(tile));
        let se = self
            .ellipsoid
            .geodetic_to_ecef(&self.tile_lat_lon_origin(&tile.opposite_corner()));
        let mut sphere = BoundingSphere::new((nw + se) * 0.5, (se - nw).length() * 0.5);
        sphere.expand_by_point(self.ellipsoid.geodetic_to_ecef(&self.tile_lat_lon_center(tile)));
        sphere
    }

    /// Map a geodetic point into the tile's local [0,1]² texture space;
    /// u grows east, v grows north. Points outside the tile fall outside
    /// the unit square.
    pub fn texture_coords_for_lat_lon(&self, coord: &Geodetic, tile: &TileKey) -> DVec2 {
        let m = self.lat_lon_to_meters(coord);
        let nw = self.lat_lon_to_meters(&self.tile_lat_lon_origin(tile));
        let se = self.lat_lon_to_meters(&self.tile_lat_lon_origin(&tile.opposite_corner()));
        DVec2::new((m.x - nw.x) / (se.x - nw.x), (m.y - se.y) / (nw.y - se.y))
    }

    /// Substitute the tile address into a template picked uniformly at
    /// random from the configured base urls. Re-picked per call; no session
    /// affinity.
    pub fn url_for_tile(&self, tile: &TileKey) -> String {
        let index = if self.base_urls.len() > 1 {
            rand::thread_rng().gen_range(0..self.base_urls.len())
        } else {
            0
        };
        let y = if self.google_tile_convention {
            tile.y
        } else {
            tile.flipped_y()
        };
        let template = Template::new(self.base_urls[index].as_str());
        let mut data: HashMap<&str, String> = HashMap::new();
        data.insert("x", tile.x.to_string());
        data.insert("y", y.to_string());
        data.insert("z", tile.level.to_string());
        template.render_nofail(&data)
    }
}
