use std::io::Cursor;
use std::path::Path;

use image::{ColorType, DynamicImage, ImageFormat, ImageReader, RgbImage};
use indicatif::ProgressStyle;

/// 打开并解码图片，格式根据文件内容判断而不是后缀名
///
/// 文件句柄在解码完成后即释放
pub fn open_image(path: impl AsRef<Path>) -> anyhow::Result<DynamicImage> {
    let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    Ok(image)
}

/// 是否已经是 8 位 RGB 图片
pub fn is_rgb(image: &DynamicImage) -> bool {
    image.color() == ColorType::Rgb8
}

/// 转换为 8 位 RGB，透明通道直接丢弃
pub fn to_rgb(image: DynamicImage) -> RgbImage {
    match image {
        DynamicImage::ImageRgb8(image) => image,
        other => other.to_rgb8(),
    }
}

/// 将 RGB 图片编码为 PNG
pub fn encode_png(image: &RgbImage) -> image::ImageResult<Vec<u8>> {
    let mut buf = Cursor::new(vec![]);
    image.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}

/// 解码 PNG 为 RGB 图片
pub fn decode_png(bytes: &[u8]) -> image::ImageResult<RgbImage> {
    Ok(image::load_from_memory_with_format(bytes, ImageFormat::Png)?.to_rgb8())
}

pub fn pb_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta}) {msg}")
        .expect("failed to build progress style")
        .progress_chars("#>-")
}
