use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail, ensure};
use byteorder::BigEndian;
use heed::types::{Bytes, SerdeBincode, Str, U64};
use heed::{Database, Env, EnvOpenOptions, WithTls};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::{Cell, Column, Features, Table};

const DATA_FILE: &str = "data.mdb";
const META_KEY: &str = "meta";
const MIB: usize = 1 << 20;

/// 存储在 lmdb 中的数据集元数据
#[derive(Serialize, Deserialize, Debug)]
struct Meta {
    /// 列定义
    features: Features,
    /// 行数，用于校验
    num_rows: u64,
    /// 内容指纹，用于校验
    fingerprint: String,
}

type MetaDb = Database<Str, SerdeBincode<Meta>>;
// 使用大端序作为键，保证 lmdb 中的遍历顺序就是行顺序
type RowDb = Database<U64<BigEndian>, Bytes>;

/// 路径下是否存在已保存的数据集
pub fn is_dataset(path: impl AsRef<Path>) -> bool {
    path.as_ref().join(DATA_FILE).is_file()
}

/// 将数据集保存到目录中，目录不存在时会自动创建
///
/// 已经存在数据集的目录不会被覆盖
pub fn save(table: &Table, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if is_dataset(path) {
        bail!("{} 已存在数据集，拒绝覆盖", path.display());
    }
    fs::create_dir_all(path).with_context(|| format!("无法创建目录 {}", path.display()))?;

    let env = open_env(path, estimate_map_size(table))?;
    let mut txn = env.write_txn()?;
    let db_meta: MetaDb = env.create_database(&mut txn, Some("meta"))?;
    let db_rows: RowDb = env.create_database(&mut txn, Some("rows"))?;

    for (i, cells) in table.iter_cells().enumerate() {
        db_rows.put(&mut txn, &(i as u64), &bincode::serialize(&cells)?)?;
    }
    let meta = Meta {
        features: table.features().clone(),
        num_rows: table.len() as u64,
        fingerprint: table.fingerprint(),
    };
    debug!("写入元数据: {} 行, 指纹 {}", meta.num_rows, meta.fingerprint);
    db_meta.put(&mut txn, META_KEY, &meta)?;
    txn.commit()?;

    env.prepare_for_closing().wait();
    info!("已保存 {} 条数据到 {}", table.len(), path.display());
    Ok(())
}

/// 从目录中加载数据集
pub fn load(path: impl AsRef<Path>) -> Result<Table> {
    let path = path.as_ref();
    // 先检查，避免 lmdb 在普通目录中创建新文件
    if !is_dataset(path) {
        bail!("{} 不是有效的数据集目录", path.display());
    }
    let file_size = fs::metadata(path.join(DATA_FILE))?.len() as usize;
    let env = open_env(path, round_up(file_size + MIB))?;

    let table = {
        let txn = env.read_txn()?;
        let Some(db_meta) = env.open_database::<Str, SerdeBincode<Meta>>(&txn, Some("meta"))? else {
            bail!("{} 缺少元数据", path.display());
        };
        let Some(db_rows) = env.open_database::<U64<BigEndian>, Bytes>(&txn, Some("rows"))? else {
            bail!("{} 缺少数据", path.display());
        };
        let Some(meta) = db_meta.get(&txn, META_KEY)? else {
            bail!("{} 缺少元数据", path.display());
        };

        let mut rows = Vec::with_capacity(meta.num_rows as usize);
        for (expected, item) in db_rows.iter(&txn)?.enumerate() {
            let (i, data) = item?;
            ensure!(i == expected as u64, "数据集行号不连续: 期望 {}，实际 {}", expected, i);
            rows.push(bincode::deserialize::<Vec<Cell>>(data)?);
        }
        ensure!(
            rows.len() as u64 == meta.num_rows,
            "数据集行数不一致: 元数据记录 {} 行，实际 {} 行",
            meta.num_rows,
            rows.len()
        );

        let table = Table::from_rows(meta.features, rows)?;
        ensure!(table.fingerprint() == meta.fingerprint, "数据集指纹校验失败: {}", path.display());
        table
    };

    env.prepare_for_closing().wait();
    Ok(table)
}

fn open_env(path: &Path, map_size: usize) -> Result<Env<WithTls>> {
    let env = unsafe { EnvOpenOptions::new().map_size(map_size).max_dbs(2).open(path)? };
    Ok(env)
}

/// 估算写入所需的 map 大小，lmdb 的大值会占用额外的溢出页，这里按两倍计算
fn estimate_map_size(table: &Table) -> usize {
    let payload: usize = table
        .columns
        .iter()
        .map(|column| match column {
            Column::Image(v) => v.iter().map(|b| b.bytes.len() + 64).sum::<usize>(),
            Column::String(v) => v.iter().map(|s| s.len() + 16).sum::<usize>(),
        })
        .sum();
    round_up(payload * 2 + 16 * MIB)
}

/// 向上取整到 MiB，满足 lmdb 对页大小整数倍的要求
fn round_up(size: usize) -> usize {
    size.div_ceil(MIB) * MIB
}
