use std::path::PathBuf;
use svtk_cli::pipeline::{list_features, run_call, CallJob};
#[macro_use]
extern crate log;

fn main() -> Result<(), svcaller::Error> {
    let matches = svtk_cli::svtk_commands::svtk_parser().get_matches();
    if let Some((_, sub_m)) = matches.subcommand() {
        let level = match sub_m.get_count("verbose") {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
    }
    let result = match matches.subcommand() {
        Some(("call", sub_m)) => {
            debug!("START\tCall");
            run_call(&CallJob::from_matches(sub_m))
        }
        Some(("features", sub_m)) => {
            let model = sub_m.get_one::<String>("model").map(PathBuf::from);
            let stdout = std::io::stdout();
            list_features(model.as_deref(), stdout.lock())
        }
        _ => unreachable!(),
    };
    if let Err(why) = result.as_ref() {
        error!("{}", why);
    }
    result
}
