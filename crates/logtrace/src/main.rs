use logtrace::runtime::{boot, stop};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    boot::init_logging();
    let mut app = boot::boot()?;
    app.start()?;

    stop::shutdown_signal().await;
    app.shutdown().await;
    Ok(())
}
