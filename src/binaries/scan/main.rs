use clap::Parser;
use common_base::reader::{LogReader, RecordReader};
use serde::Deserialize;
use serde::Serialize;

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

    let mut reader = LogReader::open(&config.path)?;
    let mut i = 0_u64;
    loop {
        let offset = reader.tell()?;
        let record = match reader.next_record()? {
            Some(record) => record,
            None => break,
        };

        match record.record_time() {
            Some(time) => println!(
                "{:010}>{:>10}  {:<18} {}",
                i,
                offset,
                record.record_type().name(),
                time
            ),
            None => println!(
                "{:010}>{:>10}  {:<18} -",
                i,
                offset,
                record.record_type().name()
            ),
        }
        i += 1;
    }

    Ok(())
}
