#[tokio::main]
async fn main() {
    if let Err(err) = caseforge_lib::run().await {
        eprintln!("caseforge: {}", err);
        std::process::exit(1);
    }
}
