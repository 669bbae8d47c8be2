use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use bytesize::ByteSize;
use clap::ArgEnum;
use env_logger;
use log;

use ext_merge::{invert, BufferPlan, FileMergerBuilder};

fn main() {
    let arg_parser = build_arg_parser();

    let log_level: LogLevel = arg_parser.value_of_t_or_exit("log_level");
    init_logger(log_level);

    let order: Order = arg_parser.value_of_t_or_exit("sort");
    let ratio: f64 = arg_parser.value_of_t_or_exit("ratio");
    let memory = arg_parser.value_of("memory").expect("value is required");
    let reclaim = arg_parser.is_present("reclaim");
    let do_invert = arg_parser.is_present("invert");

    let inputs: Vec<PathBuf> = arg_parser
        .values_of("input")
        .expect("value is required")
        .map(PathBuf::from)
        .collect();
    let output = PathBuf::from(arg_parser.value_of("output").expect("value is required"));

    let merger = match FileMergerBuilder::new()
        .with_buffer_plan(BufferPlan::Budget {
            total_bytes: memory.parse::<ByteSize>().expect("value is pre-validated").as_u64(),
            write_ratio: ratio,
        })
        .with_disk_reclamation(reclaim)
        .build()
    {
        Ok(merger) => merger,
        Err(err) => {
            log::error!("merger initialization error: {}", err);
            process::exit(1);
        }
    };

    // the merge emits records in its comparator's order, which is the reverse of the
    // sources' physical order; with --invert the merge runs under the opposite order
    // into a scratch file and the rewrite pass restores the requested one
    let compare: fn(&[u8], &[u8]) -> Ordering = match (order, do_invert) {
        (Order::Asc, false) | (Order::Desc, true) => ascending,
        (Order::Desc, false) | (Order::Asc, true) => descending,
    };

    let merge_target_path = if do_invert {
        scratch_path(&output)
    } else {
        output.clone()
    };

    let merge_target = match fs::File::create(&merge_target_path) {
        Ok(file) => file,
        Err(err) => {
            log::error!("output file creation error: {}", err);
            process::exit(1);
        }
    };

    if let Err(err) = merger.merge_by(&inputs, merge_target, compare) {
        log::error!("merging error: {}", err);
        process::exit(1);
    }

    if do_invert {
        let final_target = match fs::File::create(&output) {
            Ok(file) => file,
            Err(err) => {
                log::error!("output file creation error: {}", err);
                let _ = fs::remove_file(&merge_target_path);
                process::exit(1);
            }
        };

        if let Err(err) = invert(&merge_target_path, final_target, b"\n", b"") {
            log::error!("forward-rewrite error: {}", err);
            let _ = fs::remove_file(&merge_target_path);
            process::exit(1);
        }

        if let Err(err) = fs::remove_file(&merge_target_path) {
            log::error!("scratch file removal error: {}", err);
            process::exit(1);
        }
    }
}

fn ascending(a: &[u8], b: &[u8]) -> Ordering {
    a.cmp(b)
}

fn descending(a: &[u8], b: &[u8]) -> Ordering {
    b.cmp(a)
}

fn scratch_path(output: &Path) -> PathBuf {
    let mut name = output.file_name().unwrap_or_default().to_os_string();
    name.push(".rev");
    output.with_file_name(name)
}

#[derive(Copy, Clone, clap::ArgEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn possible_values() -> impl Iterator<Item = clap::PossibleValue<'static>> {
        Self::value_variants().iter().filter_map(|v| v.to_possible_value())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <LogLevel as clap::ArgEnum>::from_str(s, false)
    }
}

#[derive(Copy, Clone, clap::ArgEnum)]
enum Order {
    Asc,
    Desc,
}

impl Order {
    pub fn possible_values() -> impl Iterator<Item = clap::PossibleValue<'static>> {
        Order::value_variants().iter().filter_map(|v| v.to_possible_value())
    }
}

impl std::str::FromStr for Order {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Order as clap::ArgEnum>::from_str(s, false)
    }
}

fn build_arg_parser() -> clap::ArgMatches {
    clap::App::new("ext-merge")
        .about("external k-way merger of pre-sorted line files")
        .arg(
            clap::Arg::new("input")
                .short('i')
                .long("input")
                .help(
                    "pre-sorted files to be merged; they must be stored sorted in the \
                     reverse of the requested order, or in the requested order itself \
                     when --invert is given",
                )
                .required(true)
                .takes_value(true)
                .multiple_values(true)
                .min_values(2),
        )
        .arg(
            clap::Arg::new("output")
                .short('o')
                .long("output")
                .help("result file")
                .required(true)
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("sort")
                .short('s')
                .long("sort")
                .help("output ordering")
                .takes_value(true)
                .default_value("asc")
                .possible_values(Order::possible_values()),
        )
        .arg(
            clap::Arg::new("log_level")
                .short('l')
                .long("loglevel")
                .help("logging level")
                .takes_value(true)
                .default_value("info")
                .possible_values(LogLevel::possible_values()),
        )
        .arg(
            clap::Arg::new("memory")
                .short('m')
                .long("memory")
                .help("total buffer memory allowance")
                .takes_value(true)
                .default_value("16MiB")
                .validator(|v| match v.parse::<ByteSize>() {
                    Ok(_) => Ok(()),
                    Err(err) => Err(format!("Memory allowance format incorrect: {}", err)),
                }),
        )
        .arg(
            clap::Arg::new("ratio")
                .short('r')
                .long("ratio")
                .help("fraction of the memory allowance reserved for writing")
                .takes_value(true)
                .default_value("0.5")
                .validator(|v| match v.parse::<f64>() {
                    Ok(ratio) if ratio > 0.0 && ratio < 1.0 => Ok(()),
                    Ok(_) => Err("Ratio must be within (0, 1)".to_string()),
                    Err(err) => Err(format!("Ratio format incorrect: {}", err)),
                }),
        )
        .arg(
            clap::Arg::new("reclaim")
                .long("reclaim")
                .help("truncate and delete source files as they are consumed"),
        )
        .arg(
            clap::Arg::new("invert")
                .long("invert")
                .help(
                    "run the forward-rewrite pass; inputs must then be stored in the \
                     requested order rather than its reverse",
                ),
        )
        .get_matches()
}

fn init_logger(log_level: LogLevel) {
    env_logger::Builder::new()
        .filter_level(match log_level {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        })
        .format_timestamp_millis()
        .init();
}
