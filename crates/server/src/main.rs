#[tokio::main]
async fn main() -> anyhow::Result<()> {
    soberly_server::run().await
}
