/// Quadtree tile address: column, row and zoom level. `x` and `y` are valid
/// in `[0, 2^level)`.
///
/// Row numbering follows the XYZ/google convention (origin at the top); the
/// TMS convention (origin at the bottom) converts through `flipped_y`, and
/// identity is exact triple equality after normalizing to one scheme.
#[derive(Default, Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct TileKey {
    pub x: u32,
    pub y: u32,
    pub level: u32,
}

impl TileKey {
    pub fn new(x: u32, y: u32, level: u32) -> Self {
        Self { x, y, level }
    }

    pub fn southwest(&self) -> TileKey {
        TileKey {
            x: self.x * 2,
            y: self.y * 2 + 1,
            level: self.level + 1,
        }
    }

    pub fn southeast(&self) -> TileKey {
        TileKey {
            x: self.x * 2 + 1,
            y: self.y * 2 + 1,
            level: self.level + 1,
        }
    }

    pub fn northwest(&self) -> TileKey {
        TileKey {
            x: self.x * 2,
            y: self.y * 2,
            level: self.level + 1,
        }
    }

    pub fn northeast(&self) -> TileKey {
        TileKey {
            x: self.x * 2 + 1,
            y: self.y * 2,
            level: self.level + 1,
        }
    }

    /// Fixed deterministic traversal order: NW, NE, SW, SE.
    pub fn children(&self) -> [TileKey; 4] {
        [
            self.northwest(),
            self.northeast(),
            self.southwest(),
            self.southeast(),
        ]
    }

    pub fn parent(&self) -> Option<TileKey> {
        if self.level == 0 {
            return None;
        }
        Some(TileKey {
            x: self.x / 2,
            y: self.y / 2,
            level: self.level - 1,
        })
    }

    /// The diagonal neighbor `{x+1, y+1}` at the same zoom; its origin is
    /// this tile's far corner, which is how tile bounds are derived.
    pub fn opposite_corner(&self) -> TileKey {
        TileKey {
            x: self.x + 1,
            y: self.y + 1,
            level: self.level,
        }
    }

    /// Row index under the opposite row-numbering convention.
    pub fn flipped_y(&self) -> u32 {
        (1u32 << self.level) - 1 - self.y
    }

    /// Both coordinates inside `[0, 2^level)`.
    pub fn is_valid(&self) -> bool {
        let n = 1u64 << self.level;
        (self.x as u64) < n && (self.y as u64) < n
    }
}
