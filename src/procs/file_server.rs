// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use clap::{Arg, ArgMatches};

use crate::procs::{self, ChildSpec, Process};
use crate::Error;

pub const PYTHON: &str = "python";
pub const PORT: &str = "port";
pub const WEB_ROOT: &str = "web-root";

/// Static file server for the browser client, `python3 -m http.server`
///
/// The pipeline launched after it is held back by the startup delay, giving both servers time to bind.
#[derive(Debug)]
pub struct FileServer;

impl Process for FileServer {
    const NAME: &'static str = "webserver";
    const LOG_NAME: &'static str = "webserver.log";

    fn args() -> Vec<Arg<'static, 'static>> {
        vec![
            Arg::with_name(PYTHON)
                .long(PYTHON)
                .value_name("PATH")
                .default_value("python3")
                .help("python interpreter used to serve the web root")
                .takes_value(true),
            Arg::with_name(PORT)
                .short("p")
                .long(PORT)
                .value_name("PORT")
                .default_value("3000")
                .validator(|p| {
                    p.parse::<u16>()
                        .map(|_| ())
                        .map_err(|_| String::from("a port number was expected"))
                })
                .help("port the web root is served on")
                .takes_value(true),
            Arg::with_name(WEB_ROOT)
                .long(WEB_ROOT)
                .value_name("DIR")
                .default_value("public")
                .help("directory holding the browser client")
                .takes_value(true),
        ]
    }

    fn child_spec(args: &ArgMatches<'_>) -> Result<ChildSpec, Error> {
        let python = procs::required(args, PYTHON)?;
        let port = procs::required(args, PORT)?;
        let web_root = procs::required(args, WEB_ROOT)?;
        let delay = procs::millis(args, procs::STARTUP_DELAY)?;

        Ok(
            ChildSpec::new(Self::NAME, python, procs::log_path::<Self>(args))
                .args(vec!["-m", "http.server", port, "--directory", web_root])
                .requires(web_root)
                .delay_next(delay),
        )
    }
}
