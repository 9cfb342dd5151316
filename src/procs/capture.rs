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

pub const DEVICE: &str = "device";
pub const WIDTH: &str = "width";
pub const HEIGHT: &str = "height";
pub const FRAMERATE: &str = "framerate";

const PIPELINE: &str = "gst-launch-1.0 v4l2src device={device} \
    ! video/x-raw,width={width},height={height},framerate={framerate}/1 \
    ! videoconvert \
    ! x264enc speed-preset=ultrafast tune=zerolatency key-int-max=60 \
    ! rtspclientsink location={rtsp_url}";

/// Camera capture, a GStreamer pipeline encoding a V4L2 device to H.264 and pushing it to the media server
#[derive(Debug)]
pub struct Capture;

impl Capture {
    pub fn template() -> CommandTemplate {
        CommandTemplate::from_line(Self::NAME, PIPELINE)
    }
}

fn number(name: &'static str, default: &'static str, help: &'static str) -> Arg<'static, 'static> {
    Arg::with_name(name)
        .long(name)
        .value_name("NUMBER")
        .default_value(default)
        .validator(|i| {
            i.parse::<u32>()
                .map(|_| ())
                .map_err(|_| String::from("number was expected"))
        })
        .help(help)
        .takes_value(true)
}

impl Process for Capture {
    const NAME: &'static str = "gstreamer";
    const LOG_NAME: &'static str = "gstreamer.log";

    fn args() -> Vec<Arg<'static, 'static>> {
        vec![
            Arg::with_name(DEVICE)
                .short("d")
                .long(DEVICE)
                .value_name("DEVICE")
                .default_value("/dev/video0")
                .help("video4linux capture device")
                .takes_value(true),
            number(WIDTH, "640", "capture width in pixels"),
            number(HEIGHT, "480", "capture height in pixels"),
            number(FRAMERATE, "30", "capture frames per second"),
        ]
    }

    fn child_spec(args: &ArgMatches<'_>) -> Result<ChildSpec, Error> {
        let mut params = Params::new();
        for &name in &[DEVICE, WIDTH, HEIGHT, FRAMERATE] {
            params.insert(name, procs::required(args, name)?.to_string());
        }
        params.insert("rtsp_url", procs::required(args, procs::RTSP_URL)?.to_string());

        let (program, argv) = Self::template().render(&params)?;
        Ok(ChildSpec::new(Self::NAME, program, procs::log_path::<Self>(args)).args(argv))
    }
}
