//! Request middleware, applied outermost-first: IP allowlist, decryption,
//! request logging, gzip, request hash verification, response hash signing.
//! Each layer passes straight through when its configuration is absent.

pub mod allowlist;
pub mod decrypt;
pub mod gzip;
pub mod hash;
pub mod logging;
