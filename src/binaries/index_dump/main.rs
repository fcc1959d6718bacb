use clap::Parser;
use common_base::reader::LogReader;
use common_base::record::RecordType;
use serde::Deserialize;
use serde::Serialize;
use swathlog_index::{register_progress_callback, FileIndex, ProgressPhase};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Parser)]
#[clap(about, version, author)]
struct Config {
    #[clap(long)]
    pub path: String,
}

fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    if config.path.is_empty() {
        println!("path MUST not be empty!");
        return Ok(());
    }

    register_progress_callback(|phase, percent| {
        let label = match phase {
            ProgressPhase::Scanning => "scan",
            ProgressPhase::Creating => "write",
            ProgressPhase::Appending => "append",
        };
        eprint!("\r{:>6} {:>3}%", label, percent);
        if percent == 100 {
            eprintln!();
        }
    });

    let mut reader = LogReader::open(&config.path)?;
    let size = reader.file_size()?;
    let mut index = FileIndex::open(&config.path, &mut reader, size)?;

    println!("index: {}", index.path().display());
    println!(
        "source size: {} bytes, byte swapped: {}",
        index.source_file_size(),
        index.swap_required()
    );

    let types: Vec<(usize, i64)> = index.types().collect();
    for (code, count) in types {
        match RecordType::from_code(code as u32) {
            Some(typ) => {
                let first = index.entry(typ, 1)?;
                let last = index.entry(typ, count)?;
                println!(
                    "{:>2} {:<18} {:>8} | {} .. {}",
                    code,
                    typ.name(),
                    count,
                    first.time,
                    last.time
                );
            }
            None => println!("{:>2} {:<18} {:>8}", code, "?", count),
        }
    }

    Ok(())
}
