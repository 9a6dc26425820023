use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgMatches, Command, arg};
use log::debug;

use spkfetch::{Config, Error, Format, RawRequest, pipeline};

fn cli() -> Command {
    Command::new("spkfetch")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Request a small-body SPK file from the Horizons system and download it")
        .arg(
            arg!(-c --config <FILE> "TOML configuration file")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(arg!(-b --binary "Request a binary SPK file (.bsp)").conflicts_with("transfer"))
        .arg(arg!(-t --transfer "Request an SPK transfer-format file (.xsp)"))
        .arg(arg!(<LABEL> "Catalogue designation, or object name when ELEMENTS is given"))
        .arg(arg!(<START> "Start of the time span, e.g. 2020-Jan-01"))
        .arg(arg!(<STOP> "End of the time span"))
        .arg(arg!(<ELEMENTS> "Osculating elements separated by ';', or \"\" for a catalogue lookup"))
        .arg(arg!(<CONTACT> "E-mail address sent to the service and used as FTP password"))
        .arg(
            arg!([OUTPUT] "Local file or directory; defaults to <id>.bsp or <id>.xsp")
                .value_parser(clap::value_parser!(PathBuf)),
        )
}

fn raw_request(matches: &ArgMatches) -> RawRequest {
    let text = |name: &str| matches.get_one::<String>(name).cloned().unwrap_or_default();
    let format = if matches.get_flag("binary") {
        Some(Format::Binary)
    } else if matches.get_flag("transfer") {
        Some(Format::Transfer)
    } else {
        None
    };

    RawRequest {
        format,
        label: text("LABEL"),
        start: text("START"),
        stop: text("STOP"),
        elements: text("ELEMENTS"),
        contact: text("CONTACT"),
        output: matches.get_one::<PathBuf>("OUTPUT").cloned(),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let matches = match cli().try_get_matches() {
        Ok(matches) => matches,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => Config::load(path),
        None => Ok(Config::default()),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("spkfetch: {}", Error::from(e));
            return ExitCode::from(1);
        }
    };
    debug!("configuration: {config:?}");

    let outcome = pipeline::execute(raw_request(&matches), &config).await;
    if outcome.success {
        println!("{outcome}");
    } else {
        eprintln!("spkfetch: {outcome}");
    }
    ExitCode::from(outcome.exit_code())
}
