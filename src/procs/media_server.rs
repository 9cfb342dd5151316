// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use clap::{Arg, ArgMatches};

use crate::procs::{self, ChildSpec, Process};
use crate::Error;

pub const MEDIA_SERVER: &str = "media-server";

/// The RTSP/WebRTC media server, mediamtx
///
/// Rules:
///   - launched first, it is the primary child whose exit ends the run
///   - only checked for existence, not for having bound its ports
#[derive(Debug)]
pub struct MediaServer;

impl Process for MediaServer {
    const NAME: &'static str = "mediamtx";
    const LOG_NAME: &'static str = "mediamtx.log";

    fn args() -> Vec<Arg<'static, 'static>> {
        vec![Arg::with_name(MEDIA_SERVER)
            .long(MEDIA_SERVER)
            .value_name("PATH")
            .default_value("./mediamtx/mediamtx")
            .help("path to the mediamtx executable")
            .takes_value(true)]
    }

    fn child_spec(args: &ArgMatches<'_>) -> Result<ChildSpec, Error> {
        let program = procs::required(args, MEDIA_SERVER)?;

        Ok(ChildSpec::new(
            Self::NAME,
            program,
            procs::log_path::<Self>(args),
        ))
    }
}
