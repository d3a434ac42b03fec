//! Ward number and zone decoding from container file names

mod decoder;
mod zones;

pub use decoder::{decode_ward, DecodeSource, WardCode};
pub use zones::{zone_code, UNKNOWN_ZONE};
