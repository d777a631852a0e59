//! Binary entrypoint for the Autostack flag CLI.

#[tokio::main]
async fn main() {
    let exit_code = autostack_cli::run().await;
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}
