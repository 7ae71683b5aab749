//! Command-line front end for the Gen Jewels client
//!
//! Each generation command plays the part of one page of the web client
//! (wizard, text-to-image, image-to-image) and goes through the shared
//! session manager, so a design left running by an interrupted invocation is
//! picked up by the next one.

pub mod app;
pub mod console;
