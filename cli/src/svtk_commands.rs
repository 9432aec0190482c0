use clap::{Arg, ArgAction, Command};

fn verbose() -> Arg {
    Arg::new("verbose")
        .short('v')
        .action(ArgAction::Count)
        .help("Debug mode. -v: info, -vv: debug, -vvv: trace")
}

fn subcommand_call() -> Command {
    Command::new("call")
        .version("0.1")
        .author("Bansho Masutani")
        .about("Call structural variants from aligned reads.")
        .arg(verbose())
        .arg(
            Arg::new("records")
                .long("records")
                .short('r')
                .value_name("JSONL")
                .required(true)
                .help("Alignment records, one JSON object per line."),
        )
        .arg(
            Arg::new("model")
                .long("model")
                .short('m')
                .value_name("JSON")
                .required(true)
                .help("Pre-trained scorer."),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_name("TOML")
                .help("Caller configuration. Missing fields take the defaults."),
        )
        .arg(
            Arg::new("output")
                .long("output")
                .short('o')
                .value_name("PATH")
                .required(true)
                .help("Output JSON of the scored calls."),
        )
        .arg(
            Arg::new("summary")
                .long("summary")
                .value_name("PATH")
                .help("Write the run summary to this file."),
        )
        .arg(
            Arg::new("threads")
                .short('t')
                .long("threads")
                .value_parser(clap::value_parser!(usize))
                .help("number of threads. Overrides the configuration."),
        )
}

fn subcommand_features() -> Command {
    Command::new("features")
        .version("0.1")
        .author("Bansho Masutani")
        .about("List the feature layout. With --model, check a model against it.")
        .arg(verbose())
        .arg(
            Arg::new("model")
                .long("model")
                .short('m')
                .value_name("JSON"),
        )
}

pub fn svtk_parser() -> Command {
    Command::new("svtk")
        .version("0.1")
        .author("Bansho Masutani")
        .about("Structural variant toolkit")
        .arg_required_else_help(true)
        .subcommand(subcommand_call())
        .subcommand(subcommand_features())
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn parse_call() {
        let matches = svtk_parser()
            .try_get_matches_from([
                "svtk", "call", "-r", "reads.jsonl", "-m", "model.json", "-o", "out.json", "-t",
                "4", "-vv",
            ])
            .unwrap();
        let (name, sub_m) = matches.subcommand().unwrap();
        assert_eq!(name, "call");
        assert_eq!(sub_m.get_one::<String>("records").unwrap(), "reads.jsonl");
        assert_eq!(sub_m.get_one::<usize>("threads"), Some(&4));
        assert_eq!(sub_m.get_count("verbose"), 2);
        assert!(sub_m.get_one::<String>("config").is_none());
    }
    #[test]
    fn model_is_required() {
        let result = svtk_parser().try_get_matches_from(["svtk", "call", "-r", "x", "-o", "y"]);
        assert!(result.is_err());
    }
    #[test]
    fn parser_is_consistent() {
        svtk_parser().debug_assert();
    }
}
