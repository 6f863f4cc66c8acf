use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use log::info;
use serde::Deserialize;
use serde_json::Value;

use crate::config::OutputType;

/// 清单中的一条记录
#[derive(Deserialize, Debug, Clone)]
pub struct ManifestRecord {
    /// 图片文件名
    pub index: String,
    /// 图片来源
    pub source: Source,
    /// 预先生成的各类标注文本，只在读取答案时才检查
    #[serde(default)]
    pub gpt4_output: Option<Value>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Source {
    /// 相对于图片根目录的子目录
    pub base_dir: String,
}

impl ManifestRecord {
    /// 返回图片的完整路径：`<image_base_dir>/<source.base_dir>/<index>`
    pub fn image_path(&self, image_base_dir: &Path) -> PathBuf {
        image_base_dir.join(&self.source.base_dir).join(&self.index)
    }

    /// 取出指定类型的标注，缺失或不是字符串时返回错误
    pub fn answer(&self, output_type: OutputType) -> Result<&str> {
        let key = output_type.as_key();
        let output = self.gpt4_output.as_ref().ok_or_else(|| anyhow!("记录中不存在 gpt4_output"))?;
        let value = output
            .as_object()
            .ok_or_else(|| anyhow!("gpt4_output 不是对象: {}", output))?
            .get(key)
            .ok_or_else(|| anyhow!("gpt4_output 中不存在字段 {:?}", key))?;
        value.as_str().ok_or_else(|| anyhow!("gpt4_output.{} 不是字符串: {}", key, value))
    }
}

/// 读取并解析清单文件
pub fn load_manifest(path: impl AsRef<Path>) -> Result<Vec<ManifestRecord>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("无法打开清单文件 {}", path.display()))?;
    let records: Vec<ManifestRecord> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("无法解析清单文件 {}", path.display()))?;
    info!("读取清单完成，共 {} 条记录", records.len());
    Ok(records)
}
