use anyhow::Result;
use sheet_translate::utils::logging;
use sheet_translate::{App, Config};
use std::path::Path;

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::load(Some(Path::new("config.toml")))?;

    // 初始化日志
    logging::init(config.verbose_logging, Some(&config.output_log_file))?;

    // 初始化并运行应用
    let _summary = App::initialize(config).await?.run().await?;

    Ok(())
}
