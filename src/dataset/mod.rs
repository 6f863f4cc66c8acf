use std::fmt;

use anyhow::{Result, bail, ensure};
use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::processor::Processed;
use crate::utils;

pub mod storage;

pub const IMAGE_COLUMN: &str = "image";
pub const TEXT_COLUMN: &str = "text_data";
pub const ANSWER_COLUMN: &str = "answer";

/// 列类型
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum FeatureType {
    /// 图片
    Image,
    /// 普通值，参数为数据类型，目前只有 "string"
    Value(String),
}

impl FeatureType {
    pub fn string() -> Self {
        FeatureType::Value("string".to_owned())
    }
}

/// 数据集的列定义，保持声明顺序
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Features(pub Vec<(String, FeatureType)>);

impl Features {
    pub fn names(&self) -> Vec<String> {
        self.0.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// 以 PNG 编码保存的 RGB 图片
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ImageBlob {
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
}

impl ImageBlob {
    pub fn encode(image: &RgbImage) -> Result<Self> {
        Ok(Self { width: image.width(), height: image.height(), bytes: utils::encode_png(image)? })
    }

    pub fn decode(&self) -> Result<RgbImage> {
        Ok(utils::decode_png(&self.bytes)?)
    }

    /// 存储的图片总是 RGB
    pub fn mode(&self) -> &'static str {
        "RGB"
    }
}

impl fmt::Display for ImageBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Image mode={} size={}x{}>", self.mode(), self.width, self.height)
    }
}

/// 单个单元格
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Image(ImageBlob),
    String(String),
}

impl Cell {
    fn matches(&self, feature: &FeatureType) -> bool {
        matches!((self, feature), (Cell::Image(_), FeatureType::Image) | (Cell::String(_), FeatureType::Value(_)))
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Image(image) => write!(f, "{}", image),
            Cell::String(s) => write!(f, "{:?}", s),
        }
    }
}

/// 一整列数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Column {
    Image(Vec<ImageBlob>),
    String(Vec<String>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Image(v) => v.len(),
            Column::String(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn matches(&self, feature: &FeatureType) -> bool {
        matches!(
            (self, feature),
            (Column::Image(_), FeatureType::Image) | (Column::String(_), FeatureType::Value(_))
        )
    }

    fn cell(&self, i: usize) -> Cell {
        match self {
            Column::Image(v) => Cell::Image(v[i].clone()),
            Column::String(v) => Cell::String(v[i].clone()),
        }
    }

    fn empty_like(feature: &FeatureType) -> Self {
        match feature {
            FeatureType::Image => Column::Image(vec![]),
            FeatureType::Value(_) => Column::String(vec![]),
        }
    }

    fn push(&mut self, cell: Cell) -> Result<()> {
        match (self, cell) {
            (Column::Image(v), Cell::Image(x)) => v.push(x),
            (Column::String(v), Cell::String(x)) => v.push(x),
            (_, cell) => bail!("单元格类型与列不匹配: {}", cell),
        }
        Ok(())
    }
}

/// 一行数据，按列顺序排列
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row(pub Vec<(String, Cell)>);

impl Row {
    pub fn get(&self, name: &str) -> Option<&Cell> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, cell)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{:?}: {}", name, cell)?;
        }
        f.write_str("}")
    }
}

/// 带类型的列式数据集
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    features: Features,
    columns: Vec<Column>,
    num_rows: usize,
}

impl Table {
    /// 使用列定义和对应的列数据构建数据集
    ///
    /// 列数、列类型以及每列长度必须一致
    pub fn from_columns(features: Features, columns: Vec<Column>) -> Result<Self> {
        ensure!(
            features.len() == columns.len(),
            "列数不一致: 定义了 {} 列，实际 {} 列",
            features.len(),
            columns.len()
        );
        for ((name, feature), column) in features.0.iter().zip(&columns) {
            ensure!(column.matches(feature), "列 {} 的类型与定义 {:?} 不匹配", name, feature);
        }
        let num_rows = columns.first().map(Column::len).unwrap_or(0);
        for ((name, _), column) in features.0.iter().zip(&columns) {
            ensure!(
                column.len() == num_rows,
                "列 {} 的长度为 {}，与其他列的 {} 不一致",
                name,
                column.len(),
                num_rows
            );
        }
        Ok(Self { features, columns, num_rows })
    }

    /// 逐行构建数据集，主要用于从磁盘加载
    pub fn from_rows(features: Features, rows: impl IntoIterator<Item = Vec<Cell>>) -> Result<Self> {
        let mut columns = features.0.iter().map(|(_, f)| Column::empty_like(f)).collect::<Vec<_>>();
        for (i, row) in rows.into_iter().enumerate() {
            ensure!(row.len() == columns.len(), "第 {} 行的列数为 {}，应为 {}", i, row.len(), columns.len());
            for ((column, cell), (_, feature)) in columns.iter_mut().zip(row).zip(&features.0) {
                ensure!(cell.matches(feature), "第 {} 行的单元格类型与定义 {:?} 不匹配", i, feature);
                column.push(cell)?;
            }
        }
        Self::from_columns(features, columns)
    }

    pub fn features(&self) -> &Features {
        &self.features
    }

    pub fn column_names(&self) -> Vec<String> {
        self.features.names()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.features.0.iter().position(|(n, _)| n == name).map(|i| &self.columns[i])
    }

    pub fn len(&self) -> usize {
        self.num_rows
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    /// 返回第 `i` 行的单元格
    pub fn cells(&self, i: usize) -> Option<Vec<Cell>> {
        (i < self.num_rows).then(|| self.columns.iter().map(|c| c.cell(i)).collect())
    }

    /// 按行遍历所有单元格
    pub fn iter_cells(&self) -> impl Iterator<Item = Vec<Cell>> + '_ {
        (0..self.num_rows).map(|i| self.columns.iter().map(|c| c.cell(i)).collect())
    }

    pub fn row(&self, i: usize) -> Option<Row> {
        let cells = self.cells(i)?;
        Some(Row(self.column_names().into_iter().zip(cells).collect()))
    }

    /// 计算数据集内容的 blake3 指纹
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for (name, feature) in &self.features.0 {
            hasher.update(name.as_bytes());
            hasher.update(&[0]);
            if let FeatureType::Value(dtype) = feature {
                hasher.update(dtype.as_bytes());
            }
            hasher.update(&[0]);
        }
        for column in &self.columns {
            match column {
                Column::Image(v) => {
                    for blob in v {
                        hasher.update(&blob.width.to_le_bytes());
                        hasher.update(&blob.height.to_le_bytes());
                        hasher.update(&(blob.bytes.len() as u64).to_le_bytes());
                        hasher.update(&blob.bytes);
                    }
                }
                Column::String(v) => {
                    for s in v {
                        hasher.update(&(s.len() as u64).to_le_bytes());
                        hasher.update(s.as_bytes());
                    }
                }
            }
        }
        hasher.finalize().to_hex().to_string()
    }

    /// 数据集概况：行数、列名以及第一行
    pub fn describe(&self) -> Summary {
        Summary { num_rows: self.len(), column_names: self.column_names(), first_row: self.row(0) }
    }
}

/// 数据集概况
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub num_rows: usize,
    pub column_names: Vec<String>,
    pub first_row: Option<Row>,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Dataset has {} examples", self.num_rows)?;
        writeln!(f, "{:?}", self.column_names)?;
        match &self.first_row {
            Some(row) => write!(f, "{}", row),
            None => write!(f, "(empty)"),
        }
    }
}

/// 图文数据集的列定义：`image`、`text_data`、`answer`
pub fn default_features() -> Features {
    Features(vec![
        (IMAGE_COLUMN.to_owned(), FeatureType::Image),
        (TEXT_COLUMN.to_owned(), FeatureType::string()),
        (ANSWER_COLUMN.to_owned(), FeatureType::string()),
    ])
}

/// 使用处理好的三列数据构建数据集，图片会被编码为 PNG
pub fn build_table(processed: Processed) -> Result<Table> {
    let images = processed.images.iter().map(ImageBlob::encode).collect::<Result<Vec<_>>>()?;
    Table::from_columns(
        default_features(),
        vec![
            Column::Image(images),
            Column::String(processed.prompts),
            Column::String(processed.answers),
        ],
    )
}
