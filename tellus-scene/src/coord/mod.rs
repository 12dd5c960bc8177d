mod geodetic;

pub use geodetic::Geodetic;
