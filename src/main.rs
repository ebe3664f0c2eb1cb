// src/main.rs

use assetpipe::runner::{exit_status, failure_lines};
use assetpipe::{cli, logging, run};

#[tokio::main]
async fn main() {
    let args = cli::parse();
    if let Err(err) = logging::init_logging(args.log_level) {
        eprintln!("assetpipe error: {err:?}");
        std::process::exit(1);
    }

    let result = run(args).await;
    match &result {
        Ok(Some(report)) => {
            for line in report.summary_lines() {
                println!("{line}");
            }
        }
        Ok(None) => {}
        Err(err) => {
            for line in failure_lines(err) {
                eprintln!("{line}");
            }
        }
    }
    std::process::exit(exit_status(&result));
}
