// SPDX-License-Identifier: MIT

// === Sub-modules ===
#[macro_use]
pub mod macros;
pub mod bitmap;
pub mod errors;
pub mod path;

// === Error types ===
pub use errors::*;

// === Utilities ===
pub use bitmap::BitmapOps;
pub use path::*;
