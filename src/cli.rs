use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use std::path::PathBuf;

pub enum Action {
    Build,
    Query(String),
    Inspect(PathBuf),
}

pub struct Options {
    pub project: PathBuf,
    pub config: Option<PathBuf>,
    pub keep_tmp: bool,
    pub verbosity: u64,
}

pub fn app() -> App<'static, 'static> {
    App::new("debpack")
        .about("Assembles a Debian package for a desktop application")
        .version(env!("CARGO_PKG_VERSION"))
        .setting(AppSettings::VersionlessSubcommands)
        .arg(Arg::with_name("project")
            .short("C")
            .long("project")
            .takes_value(true)
            .global(true)
            .help("project directory holding the manifest, build output and resources"))
        .arg(Arg::with_name("config")
            .short("c")
            .long("config")
            .takes_value(true)
            .global(true)
            .help("packaging config to use instead of <project>/packaging.toml"))
        .arg(Arg::with_name("keep-tmp")
            .long("keep-tmp")
            .global(true)
            .help("leave the staging directory in place after packaging"))
        .arg(Arg::with_name("verbose")
            .short("v")
            .multiple(true)
            .global(true)
            .help("increase logging verbosity"))
        .subcommand(SubCommand::with_name("build")
            .about("stage the application and build its .deb (the default)"))
        .subcommand(SubCommand::with_name("query")
            .about("print a config key, manifest.<field>, config, or deb")
            .arg(Arg::with_name("key").required(true)))
        .subcommand(SubCommand::with_name("inspect")
            .about("print the control fields of a built package")
            .arg(Arg::with_name("deb").required(true)))
}

pub fn requested_action(matches: &ArgMatches) -> Action {
    match matches.subcommand() {
        ("query", Some(query)) => Action::Query(query.value_of("key").unwrap_or_default().to_owned()),
        ("inspect", Some(inspect)) => Action::Inspect(PathBuf::from(inspect.value_of_os("deb").unwrap_or_default())),
        _ => Action::Build,
    }
}

pub fn options(matches: &ArgMatches) -> Options {
    // Global arguments may be given before or after the subcommand.
    let sub = match matches.subcommand() {
        (_, Some(sub)) => sub,
        _ => matches,
    };

    let value = |name: &str| sub.value_of_os(name).or_else(|| matches.value_of_os(name));

    Options {
        project: value("project").map_or_else(|| PathBuf::from("."), PathBuf::from),
        config: value("config").map(PathBuf::from),
        keep_tmp: sub.is_present("keep-tmp") || matches.is_present("keep-tmp"),
        verbosity: sub.occurrences_of("verbose").max(matches.occurrences_of("verbose")),
    }
}
