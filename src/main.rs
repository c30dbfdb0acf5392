#[tokio::main]
async fn main() -> anyhow::Result<()> {
    watsonx_gateway_lib::run().await?;
    Ok(())
}
