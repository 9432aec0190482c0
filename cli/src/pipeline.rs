//! `svtk call`: load everything, run the caller, and write the results.
use definitions::DropTally;
use serde::{Deserialize, Serialize};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use svcaller::error::Error;
use svcaller::pipeline::{run, CancelToken};
use svcaller::region::RecordStore;
use svcaller::scorer::LogisticModel;
use svcaller::stats::Stats;
use svcaller::CallerConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallJob {
    pub records: PathBuf,
    pub model: PathBuf,
    pub config: Option<PathBuf>,
    pub output: PathBuf,
    pub summary: Option<PathBuf>,
    pub threads: Option<usize>,
}

impl CallJob {
    pub fn from_matches(matches: &clap::ArgMatches) -> Self {
        let path = |name: &str| matches.get_one::<String>(name).map(PathBuf::from);
        Self {
            records: path("records").unwrap_or_default(),
            model: path("model").unwrap_or_default(),
            config: path("config"),
            output: path("output").unwrap_or_default(),
            summary: path("summary"),
            threads: matches.get_one::<usize>("threads").copied(),
        }
    }
}

pub fn load_config(path: Option<&Path>) -> Result<CallerConfig, Error> {
    match path {
        Some(path) => {
            let profile = std::fs::read_to_string(path).map_err(|e| Error::io(e, path))?;
            CallerConfig::from_toml_str(&profile)
        }
        None => {
            let config = CallerConfig::default();
            config.validate()?;
            Ok(config)
        }
    }
}

pub fn run_call(job: &CallJob) -> Result<(), Error> {
    if let Ok(dump) = toml::to_string(job) {
        debug!("JOB\n{}", dump);
    }
    let mut config = load_config(job.config.as_deref())?;
    if let Some(threads) = job.threads {
        config.threads = threads;
    }
    // The model is checked before any record is read.
    let model = LogisticModel::from_path(&job.model)?;
    info!("LOAD\tModel\t{}", job.model.display());
    set_threads(config.threads);
    let records = std::fs::File::open(&job.records)
        .map(BufReader::new)
        .map_err(|e| Error::io(e, &job.records))?;
    let store = RecordStore::from_jsonl(records)?;
    info!("LOAD\tRecords\t{}", store.len());
    let (callset, stats) = run(&store, &model, &config, &CancelToken::new());
    let output = std::fs::File::create(&job.output).map_err(|e| Error::io(e, &job.output))?;
    let mut wtr = BufWriter::new(output);
    serde_json::to_writer(&mut wtr, &callset.calls)?;
    wtr.flush().map_err(|e| Error::io(e, &job.output))?;
    if let Some(path) = job.summary.as_ref() {
        let file = std::fs::File::create(path).map_err(|e| Error::io(e, path))?;
        let mut wtr = BufWriter::new(file);
        callset
            .stats(&mut wtr)
            .and_then(|_| stats.stats(&mut wtr))
            .and_then(|_| wtr.flush())
            .map_err(|e| Error::io(e, path))?;
    }
    for failure in callset.failures.iter() {
        warn!("FAILED\t{}\t{}", failure.region, failure.reason);
    }
    if let Some(report) = drop_report(&callset.dropped) {
        warn!("{}", report);
    }
    Ok(())
}

/// One line with the dropped total and each reason, or None if nothing was dropped.
pub fn drop_report(dropped: &DropTally) -> Option<String> {
    if dropped.total() == 0 {
        return None;
    }
    let reasons: Vec<_> = dropped
        .counts
        .iter()
        .map(|(reason, count)| format!("{}:{}", reason, count))
        .collect();
    Some(format!("DROPPED\t{}\t{}", dropped.total(), reasons.join("\t")))
}

fn set_threads(threads: usize) {
    if threads == 0 {
        return;
    }
    debug!("Set Threads\t{}", threads);
    if let Err(why) = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
    {
        debug!("{:?} The global pool was already set.", why);
    }
}

/// `svtk features`: the layout, and optionally whether a model matches it.
pub fn list_features<W: Write>(model: Option<&Path>, mut wtr: W) -> Result<(), Error> {
    for (i, name) in svcaller::scorer::FEATURE_NAMES.iter().enumerate() {
        writeln!(&mut wtr, "{}\t{}", i, name)?;
    }
    if let Some(path) = model {
        LogisticModel::from_path(path)?;
        writeln!(&mut wtr, "OK\t{}", path.display())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn default_config() {
        assert_eq!(load_config(None).unwrap(), CallerConfig::default());
        assert!(matches!(
            load_config(Some(Path::new("/no/such/profile.toml"))),
            Err(Error::Io { .. })
        ));
    }
    #[test]
    fn job_dump() {
        let job = CallJob {
            records: PathBuf::from("reads.jsonl"),
            model: PathBuf::from("model.json"),
            config: None,
            output: PathBuf::from("calls.json"),
            summary: Some(PathBuf::from("summary.tsv")),
            threads: Some(4),
        };
        let dump = toml::to_string(&job).unwrap();
        assert!(dump.contains("records = \"reads.jsonl\""));
        let back: CallJob = toml::from_str(&dump).unwrap();
        assert_eq!(back, job);
    }
    #[test]
    fn drops_are_reported() {
        assert_eq!(drop_report(&DropTally::default()), None);
        let mut dropped = DropTally::default();
        dropped.add("low_mapq");
        dropped.add("low_mapq");
        dropped.add("malformed_inverted_span");
        assert_eq!(
            drop_report(&dropped).unwrap(),
            "DROPPED\t3\tlow_mapq:2\tmalformed_inverted_span:1"
        );
    }
    #[test]
    fn features() {
        let mut out = vec![];
        list_features(None, &mut out).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert_eq!(out.lines().count(), svcaller::scorer::FEATURE_LEN);
        assert!(out.starts_with("0\tsupport\n"));
        assert!(list_features(Some(Path::new("/no/such/model.json")), vec![]).is_err());
    }
}
