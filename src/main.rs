#[macro_use]
extern crate failure_derive;
#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;

mod cli;
mod config;
mod debian;
mod manifest;
mod misc;
mod package;
mod packager;
mod template;

use log::LevelFilter;
use std::borrow::Cow;
use std::path::Path;
use std::process::exit;

use crate::cli::{Action, Options};
use crate::config::{Config, ConfigFetch};
use crate::debian::archive::DebianArchive;
use crate::manifest::Manifest;
use crate::package::{Layout, Package};
use crate::packager::DpkgDeb;

fn init_logger(verbosity: u64) -> Result<(), log::SetLoggerError> {
    let level = match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!("[{}] {}", record.level(), message))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()
}

fn main() {
    let matches = cli::app().get_matches();
    let options = cli::options(&matches);

    if let Err(why) = init_logger(options.verbosity) {
        eprintln!("debpack: failed to initialize logging: {}", why);
    }

    let mut config = match config::parse(&options.project, options.config.as_deref()) {
        Ok(config) => config,
        Err(why) => {
            error!("{}", why);
            exit(1);
        }
    };

    if options.keep_tmp {
        config.keep_tmp = true;
    }

    match cli::requested_action(&matches) {
        Action::Build => build(&options, &config),
        Action::Query(key) => query(&options, &config, &key),
        Action::Inspect(deb) => inspect(&deb),
    }
}

/// Runs the packaging pipeline against the project directory.
fn build(options: &Options, config: &Config) {
    let result = Package::init(&options.project, config, DpkgDeb::new(config))
        .and_then(|package| {
            debug!("staging in {}", package.layout().pack_dir.display());
            package.run()
        });

    match result {
        Ok(deb) => println!("{}", deb.display()),
        Err(why) => {
            error!("{}", why);
            exit(1);
        }
    }
}

/// Prints a config key, a `manifest.<field>`, the whole effective config, or the package path.
fn query(options: &Options, config: &Config, key: &str) {
    let value: Option<Cow<str>> = match key {
        "config" => match config.to_toml() {
            Ok(toml) => Some(Cow::Owned(toml)),
            Err(why) => {
                error!("{}", why);
                exit(1);
            }
        },
        "deb" => {
            let manifest = read_manifest(options, config);
            let deb = Layout::new(&options.project, config, &manifest).deb;
            Some(Cow::Owned(deb.display().to_string()))
        }
        _ if key.starts_with("manifest.") => read_manifest(options, config)
            .fetch(&key[9..])
            .map(|x| Cow::Owned(x.into_owned())),
        _ => config.fetch(key),
    };

    match value {
        Some(value) => println!("{}", value),
        None => {
            error!("config field not found: {}", key);
            exit(1);
        }
    }
}

fn read_manifest(options: &Options, config: &Config) -> Manifest {
    match manifest::read(&options.project.join(&config.manifest)) {
        Ok(manifest) => manifest,
        Err(why) => {
            error!("{}", why);
            exit(1);
        }
    }
}

/// Prints the control fields of a built package, followed by the files it installs.
fn inspect(deb: &Path) {
    let result = DebianArchive::new(deb)
        .and_then(|archive| Ok((archive.control()?, archive.data_entries()?)));

    match result {
        Ok((control, entries)) => {
            for (key, value) in &control {
                println!("{}: {}", key, value);
            }

            info!("{} installs {} entries", deb.display(), entries.len());
            for entry in entries {
                debug!("  /{}", entry.display());
            }
        }
        Err(why) => {
            error!("{}", why);
            exit(1);
        }
    }
}
