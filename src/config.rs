use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Parser, Debug, Clone)]
#[command(name = "json2dataset", version, about = "将图片清单 JSON 转换为带类型的图文数据集")]
pub struct Opts {
    /// 清单 JSON 文件路径
    #[arg(long = "json_file", alias = "json-file", value_name = "PATH")]
    pub json_file: PathBuf,
    /// 图片根目录，图片路径为 <根目录>/<source.base_dir>/<index>
    #[arg(long = "image_base_dir", alias = "image-base-dir", value_name = "PATH")]
    pub image_base_dir: PathBuf,
    /// 数据集输出目录，如果已存在则不会覆盖，而是加载并展示其内容
    #[arg(long = "output_file", alias = "output-file", value_name = "PATH")]
    pub output_file: Option<PathBuf>,
    /// 使用哪一种 GPT-4 输出作为答案
    #[arg(long = "output_type", alias = "output-type", value_enum, default_value_t = OutputType::Summarized)]
    pub output_type: OutputType,
}

/// 一次转换所需的全部参数
#[derive(Debug, Clone)]
pub struct ConvertConfig {
    /// 清单 JSON 文件
    pub json_file: PathBuf,
    /// 图片根目录
    pub image_base_dir: PathBuf,
    /// 数据集输出目录，为空时只构建不保存
    pub output_file: Option<PathBuf>,
    /// 答案字段
    pub output_type: OutputType,
}

impl From<Opts> for ConvertConfig {
    fn from(opts: Opts) -> Self {
        Self {
            json_file: opts.json_file,
            image_base_dir: opts.image_base_dir,
            output_file: opts.output_file,
            output_type: opts.output_type,
        }
    }
}

/// `gpt4_output` 中的标注类型
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputType {
    /// 结构化描述
    Structured,
    /// 简短描述
    Short,
    /// 摘要描述
    #[default]
    Summarized,
}

impl OutputType {
    /// 返回清单中对应的键名
    pub fn as_key(&self) -> &'static str {
        match self {
            OutputType::Structured => "structured",
            OutputType::Short => "short",
            OutputType::Summarized => "summarized",
        }
    }
}
