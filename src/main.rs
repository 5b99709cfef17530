// src/main.rs

use duodag::{cli, logging, run};

#[tokio::main]
async fn main() {
    if let Err(err) = run_main().await {
        eprintln!("duodag error: {err:?}");
        std::process::exit(1);
    }
    // A pending stdin read would otherwise keep the runtime alive.
    std::process::exit(0);
}

async fn run_main() -> anyhow::Result<()> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    run(args).await
}
