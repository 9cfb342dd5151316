// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Supervision of a fixed set of media-streaming processes
//!
//! Every child leads its own process group, the first child launched is watched, and on its exit
//! or on SIGINT/SIGTERM all groups are terminated in reverse launch order.

mod error;
pub mod fork;
pub mod group;
pub mod procs;
pub mod template;

pub use error::{Error, ErrorKind};
