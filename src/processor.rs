use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::RgbImage;
use indicatif::ProgressBar;
use log::{debug, info, warn};

use crate::config::OutputType;
use crate::manifest::ManifestRecord;
use crate::utils::{self, pb_style};

/// 每条样本固定使用的提示词
pub const PROMPT: &str = "Describe the image";

/// 处理完成的三列数据，三者长度相同且一一对应
#[derive(Debug, Default)]
pub struct Processed {
    pub images: Vec<RgbImage>,
    pub prompts: Vec<String>,
    pub answers: Vec<String>,
    /// 被跳过的记录
    pub skipped: Vec<Skipped>,
}

impl Processed {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    fn push(&mut self, image: RgbImage, answer: String) {
        self.images.push(image);
        self.prompts.push(PROMPT.to_owned());
        self.answers.push(answer);
    }
}

/// 被跳过的记录及原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub path: PathBuf,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// 图片不存在
    NotFound,
    /// 图片无法解码
    Decode(String),
}

impl fmt::Display for Skipped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            SkipReason::NotFound => {
                write!(f, "Image not found at {}, skipping...", self.path.display())
            }
            SkipReason::Decode(e) => {
                write!(f, "Error loading image {}: {}, skipping...", self.path.display(), e)
            }
        }
    }
}

/// 按顺序处理清单中的每一条记录
///
/// 图片不存在或无法解码的记录会被跳过并打印警告；
/// 标注字段缺失则直接返回错误，不会产生部分结果
pub fn process_records(
    records: &[ManifestRecord],
    image_base_dir: &Path,
    output_type: OutputType,
) -> Result<Processed> {
    let pb = ProgressBar::new(records.len() as u64).with_style(pb_style());
    let mut processed = Processed::default();

    for (i, record) in records.iter().enumerate() {
        let path = record.image_path(image_base_dir);
        pb.inc(1);

        let reason = if !path.exists() {
            Some(SkipReason::NotFound)
        } else {
            match utils::open_image(&path) {
                Ok(image) => {
                    if !utils::is_rgb(&image) {
                        debug!("转换为 RGB: {} ({:?})", path.display(), image.color());
                    }
                    let image = utils::to_rgb(image);
                    let answer = record
                        .answer(output_type)
                        .with_context(|| format!("第 {} 条记录 ({}) 读取标注失败", i, path.display()))?;
                    processed.push(image, answer.to_owned());
                    None
                }
                Err(e) => Some(SkipReason::Decode(e.to_string())),
            }
        };

        if let Some(reason) = reason {
            let skipped = Skipped { path, reason };
            pb.suspend(|| warn!("{}", skipped));
            processed.skipped.push(skipped);
        }
    }

    pb.finish_and_clear();
    info!("处理完成，保留 {} 条，跳过 {} 条", processed.len(), processed.skipped.len());

    Ok(processed)
}
