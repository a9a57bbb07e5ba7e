mod host;
mod relays;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    host::run().await
}
