//! Low-level helpers for reading the parts of an XLSX package.

pub(crate) mod xml;
pub(crate) mod zip;
