// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use clap::{Arg, ArgMatches};

use crate::procs::{self, ChildSpec, Process};
use crate::template::{CommandTemplate, Params};
use crate::Error;

pub const INPUT: &str = "input";
pub const HIGHPASS: &str = "highpass";
pub const LOWPASS: &str = "lowpass";
pub const GATE_THRESHOLD: &str = "gate-threshold";

/// Transcodes an existing stream or file, band-limits and gates the audio, and publishes it to the media server
#[derive(Debug)]
pub struct Transcode;

impl Transcode {
    pub fn template() -> CommandTemplate {
        CommandTemplate::new(
            Self::NAME,
            "ffmpeg",
            &[
                "-hide_banner",
                "-re",
                "-i",
                "{input}",
                "-c:v",
                "libx264",
                "-preset",
                "ultrafast",
                "-tune",
                "zerolatency",
                "-g",
                "60",
                "-af",
                "highpass=f={highpass},lowpass=f={lowpass},agate=threshold={gate_threshold}",
                "-c:a",
                "libopus",
                "-f",
                "rtsp",
                "{rtsp_url}",
            ],
        )
    }
}

fn float(name: &'static str, default: &'static str, help: &'static str) -> Arg<'static, 'static> {
    Arg::with_name(name)
        .long(name)
        .value_name("NUMBER")
        .default_value(default)
        .validator(|f| match f.parse::<f64>() {
            Ok(v) if v.is_finite() && v >= 0.0 => Ok(()),
            _ => Err(String::from("a non-negative number was expected")),
        })
        .help(help)
        .takes_value(true)
}

impl Process for Transcode {
    const NAME: &'static str = "ffmpeg";
    const LOG_NAME: &'static str = "ffmpeg.log";

    fn args() -> Vec<Arg<'static, 'static>> {
        vec![
            Arg::with_name(INPUT)
                .short("i")
                .long(INPUT)
                .value_name("URL")
                .required(true)
                .help("stream or file to transcode")
                .takes_value(true),
            float(HIGHPASS, "200", "audio highpass cutoff in Hz"),
            float(LOWPASS, "3000", "audio lowpass cutoff in Hz"),
            float(GATE_THRESHOLD, "0.01", "noise gate threshold, linear amplitude 0..1"),
        ]
    }

    fn child_spec(args: &ArgMatches<'_>) -> Result<ChildSpec, Error> {
        let mut params = Params::new();
        params.insert("input", procs::required(args, INPUT)?.to_string());
        params.insert("highpass", procs::required(args, HIGHPASS)?.to_string());
        params.insert("lowpass", procs::required(args, LOWPASS)?.to_string());
        params.insert(
            "gate_threshold",
            procs::required(args, GATE_THRESHOLD)?.to_string(),
        );
        params.insert("rtsp_url", procs::required(args, procs::RTSP_URL)?.to_string());

        let (program, argv) = Self::template().render(&params)?;
        Ok(ChildSpec::new(Self::NAME, program, procs::log_path::<Self>(args)).args(argv))
    }
}
