use std::fs;

use anyhow::{Context, Result, ensure};
use log::info;

use crate::config::ConvertConfig;
use crate::dataset::{self, Summary, Table, storage};
use crate::manifest::load_manifest;
use crate::processor::process_records;

/// 一次运行的结果
#[derive(Debug)]
pub enum Outcome {
    /// 输出目录已存在，只加载并展示
    Reloaded(Summary),
    /// 完成转换，`saved` 表示是否写入了磁盘
    Converted { table: Table, saved: bool },
}

/// 读取清单，处理图片，构建数据集，并在指定了输出目录时保存
pub fn convert_json_to_dataset(config: ConvertConfig) -> Result<Table> {
    let records = load_manifest(&config.json_file)?;
    let processed = process_records(&records, &config.image_base_dir, config.output_type)?;
    let table = dataset::build_table(processed)?;

    match &config.output_file {
        Some(output) => {
            if let Some(parent) = output.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    fs::create_dir_all(parent)
                        .with_context(|| format!("无法创建目录 {}", parent.display()))?;
                }
            }
            info!("Saving dataset to {}", output.display());
            storage::save(&table, output)?;
        }
        None => info!("No output file specified, dataset not saved"),
    }

    Ok(table)
}

/// 检查输入，然后决定是加载已有数据集还是重新转换
pub fn run(config: ConvertConfig) -> Result<Outcome> {
    ensure!(config.json_file.exists(), "JSON file {} does not exist", config.json_file.display());
    ensure!(
        config.image_base_dir.exists(),
        "Image base directory {} does not exist",
        config.image_base_dir.display()
    );

    if let Some(output) = config.output_file.as_ref().filter(|p| p.exists()) {
        info!("{} 已存在，跳过转换", output.display());
        let table = storage::load(output)?;
        return Ok(Outcome::Reloaded(table.describe()));
    }

    let saved = config.output_file.is_some();
    let table = convert_json_to_dataset(config)?;
    Ok(Outcome::Converted { table, saved })
}
