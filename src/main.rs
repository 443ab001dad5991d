use std::process::exit;
use tfs_mover::tfs_mover_main;

#[tokio::main]
async fn main() {
    println!(concat!(
        env!("CARGO_PKG_NAME"),
        " ",
        env!("CARGO_PKG_VERSION")
    ));
    match tfs_mover_main().await {
        Ok(records) if records.iter().all(|record| record.success()) => {
            exit(0);
        }
        Ok(_) => {
            exit(1);
        }
        Err(e) => {
            eprintln!("{e}");
            exit(1);
        }
    };
}
