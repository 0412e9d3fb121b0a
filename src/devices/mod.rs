//! Device drivers
//!
//! One module per receiver family. Currently only the Sony CXD5610.

pub mod cxd5610;
