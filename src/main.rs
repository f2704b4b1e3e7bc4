#[tokio::main]
async fn main() {
    let code = websecscan::app::startup::startup().await;
    std::process::exit(code);
}
