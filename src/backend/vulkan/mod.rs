mod convert;
mod device;

pub use self::device::*;
