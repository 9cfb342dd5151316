// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::ffi::OsString;
use std::io;

use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use tokio::runtime;
use tracing::info;
use tracing_subscriber::EnvFilter;

use streamrc::fork::ChildHandle;
use streamrc::procs::{
    self, Capture, ChildSpec, Event, FileServer, MediaServer, Process, Supervisor, Transcode,
};
use streamrc::Error;

const EXIT_OK: i32 = 0;
const EXIT_FAILURE: i32 = 1;

trait SetupClapApp {
    fn setup_clap_app(self) -> Self;
    fn default_subcommand_opts(self) -> Self;
    fn process_opts<P: Process>(self) -> Self;
}

fn milliseconds(
    name: &'static str,
    default: &'static str,
    help: &'static str,
) -> Arg<'static, 'static> {
    Arg::with_name(name)
        .long(name)
        .value_name("MILLIS")
        .default_value(default)
        .validator_os(|i| {
            i.to_string_lossy()
                .parse::<u64>()
                .map(|_| ())
                .map_err(|_| OsString::from("number was expected"))
        })
        .help(help)
        .takes_value(true)
}

impl SetupClapApp for App<'static, 'static> {
    fn setup_clap_app(self) -> Self {
        // invalid UTF-8 is rejected by the parser rather than panicking on access
        self.version(env!("CARGO_PKG_VERSION"))
            .author(env!("CARGO_PKG_AUTHORS"))
            .setting(AppSettings::StrictUtf8)
    }

    fn default_subcommand_opts(self) -> Self {
        self.arg(
            Arg::with_name(procs::LOG_DIR)
                .short("l")
                .long(procs::LOG_DIR)
                .value_name("DIR")
                .default_value("/tmp")
                .help("directory receiving one log file per process")
                .takes_value(true),
        )
        .arg(milliseconds(
            procs::GRACE_PERIOD,
            "500",
            "time between SIGTERM and SIGKILL during shutdown",
        ))
        .arg(milliseconds(
            procs::STARTUP_DELAY,
            "2000",
            "time given to the servers before the pipeline starts",
        ))
        .arg(
            Arg::with_name(procs::RTSP_URL)
                .long(procs::RTSP_URL)
                .value_name("URL")
                .default_value("rtsp://localhost:8554/stream")
                .help("where the pipeline publishes its stream")
                .takes_value(true),
        )
        .process_opts::<MediaServer>()
        .process_opts::<FileServer>()
    }

    fn process_opts<P: Process>(self) -> Self {
        P::args().into_iter().fold(self, |app, arg| app.arg(arg))
    }
}

fn camera_sub_command() -> App<'static, 'static> {
    SubCommand::with_name(procs::CAMERA)
        .about("stream a local camera through the media server")
        .process_opts::<Capture>()
}

fn transcode_sub_command() -> App<'static, 'static> {
    SubCommand::with_name(procs::TRANSCODE)
        .about("transcode an existing stream, filtering its audio, through the media server")
        .process_opts::<Transcode>()
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let args = App::new(env!("CARGO_PKG_NAME"))
        .setup_clap_app()
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommand(
            camera_sub_command()
                .setup_clap_app()
                .default_subcommand_opts(),
        )
        .subcommand(
            transcode_sub_command()
                .setup_clap_app()
                .default_subcommand_opts(),
        )
        .get_matches();

    let runtime = match runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to initialize Tokio Runtime: {}", e);
            std::process::exit(EXIT_FAILURE);
        }
    };

    let code = runtime.block_on(async move {
        let specs = match args.subcommand() {
            (procs::CAMERA, Some(args)) => specs_for(args, procs::camera_specs),
            (procs::TRANSCODE, Some(args)) => specs_for(args, procs::transcode_specs),
            (arg, _) => {
                println!("unexpected argument: {}", arg);
                println!("{}", args.usage());
                std::process::exit(2);
            }
        };

        match specs {
            Ok((specs, supervisor)) => run(specs, supervisor).await,
            Err(e) => {
                eprintln!("Error: {}", e);
                EXIT_FAILURE
            }
        }
    });

    std::process::exit(code);
}

fn specs_for(
    args: &ArgMatches<'_>,
    build: fn(&ArgMatches<'_>) -> Result<Vec<ChildSpec>, Error>,
) -> Result<(Vec<ChildSpec>, Supervisor), Error> {
    let specs = build(args)?;
    let grace_period = procs::millis(args, procs::GRACE_PERIOD)?;

    Ok((specs, Supervisor::new().with_grace_period(grace_period)))
}

async fn run(specs: Vec<ChildSpec>, mut supervisor: Supervisor) -> i32 {
    // signals are queued from here on, even while the children are launching
    if let Err(e) = supervisor.install_signal_handlers() {
        eprintln!("Error: failed to install signal handlers: {}", e);
        return EXIT_FAILURE;
    }

    println!("Starting all components...");
    let log_dir = specs
        .first()
        .and_then(|spec| spec.log_file().parent())
        .map(|dir| dir.display().to_string())
        .unwrap_or_default();

    let result = supervisor
        .supervise(&specs, |handles| running(handles, &log_dir))
        .await;

    match result {
        Ok(event) => {
            match event {
                Event::Signalled(signal) => info!("stopped by {}", signal),
                Event::Exited { index, status } => {
                    info!("stopped after child #{} exited: {}", index, status)
                }
            }
            println!("Cleanup complete.");
            EXIT_OK
        }
        Err(e) if e.is_precondition() => {
            eprintln!("Error: {}", e);
            EXIT_FAILURE
        }
        Err(e) if e.is_launch() => {
            eprintln!("\nAn error occurred during startup: {}", e);
            println!("Cleanup complete.");
            EXIT_FAILURE
        }
        Err(e) => {
            eprintln!("\nAn error occurred while supervising: {}", e);
            println!("Cleanup complete.");
            EXIT_FAILURE
        }
    }
}

fn running(handles: &[ChildHandle], log_dir: &str) {
    for handle in handles {
        println!("- {} started (PID: {})", handle.name(), handle.pid());
    }

    println!("\n---");
    println!("Application is running.");
    println!("Logs are located in {}", log_dir);
    println!("Press Ctrl+C in this terminal to stop everything.");
    println!("---\n");
}
