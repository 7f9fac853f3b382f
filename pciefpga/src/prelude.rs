//! Prelude (helpful reexports) for this package

pub use crate::{
    core::{
        Access,
        AccessRequest,
        Fpga,
    },
    geometry::Space,
    transport::{
        local::Local,
        Transport,
    },
    Error,
};
