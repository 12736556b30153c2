#[tokio::main]
async fn main() -> anyhow::Result<()> {
    medscribe::run().await
}
