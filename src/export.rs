use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{
    ArrayRef, Float32Builder, Int64Array, ListBuilder, StringArray, UInt64Array, UInt8Builder,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use ndarray::{ArrayView, Axis, Dimension};
use parquet::arrow::ArrowWriter;
use serde::Serialize;

use crate::data::model::{EncodedSet, LoadedDataset, SplitIndices};

/// Records per Parquet row group.
const BATCH_RECORDS: usize = 256;

// ---------------------------------------------------------------------------
// Parquet export of an encoded set
// ---------------------------------------------------------------------------

fn list_field(name: &str, item: DataType) -> Field {
    Field::new(name, DataType::List(Arc::new(Field::new("item", item, true))), false)
}

fn set_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("record", DataType::Int64, false),
        list_field("sequence", DataType::UInt8),
        list_field("profile", DataType::Float32),
        list_field("labels", DataType::Float32),
    ]))
}

/// Write `set` to Parquet, one row per record.
///
/// Schema:
/// - `record`: Int64 – row index within the set
/// - `sequence`: List<UInt8> – 700 category ids
/// - `profile`: List<Float32> – 700 × 21, row-major
/// - `labels`: List<Float32> – 700 × 8, row-major
pub fn write_parquet(set: &EncodedSet, path: &Path) -> Result<()> {
    let schema = set_schema();
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    let mut writer =
        ArrowWriter::try_new(file, schema.clone(), None).context("creating parquet writer")?;

    let mut start = 0;
    while start < set.len() {
        let end = (start + BATCH_RECORDS).min(set.len());
        let batch = set_batch(set, start..end, &schema)?;
        writer.write(&batch).context("writing parquet batch")?;
        start = end;
    }
    writer.close().context("closing parquet writer")?;
    Ok(())
}

fn set_batch(set: &EncodedSet, rows: std::ops::Range<usize>, schema: &SchemaRef) -> Result<RecordBatch> {
    let record = Int64Array::from_iter_values(rows.clone().map(|r| r as i64));

    let mut sequence = ListBuilder::new(UInt8Builder::new());
    let mut profile = ListBuilder::new(Float32Builder::new());
    let mut labels = ListBuilder::new(Float32Builder::new());
    for r in rows {
        sequence
            .values()
            .append_slice(&row_values(set.sequence.index_axis(Axis(0), r)));
        sequence.append(true);
        profile
            .values()
            .append_slice(&row_values(set.profile.index_axis(Axis(0), r)));
        profile.append(true);
        labels
            .values()
            .append_slice(&row_values(set.labels.index_axis(Axis(0), r)));
        labels.append(true);
    }

    let columns: Vec<ArrayRef> = vec![
        Arc::new(record),
        Arc::new(sequence.finish()),
        Arc::new(profile.finish()),
        Arc::new(labels.finish()),
    ];
    RecordBatch::try_new(schema.clone(), columns).context("building record batch")
}

/// Row-major copy of one record, whatever the source strides.
fn row_values<T: Copy, D: Dimension>(view: ArrayView<'_, T, D>) -> Vec<T> {
    view.iter().copied().collect()
}

// ---------------------------------------------------------------------------
// CSV export of split indices
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct SplitRow {
    index: usize,
    partition: &'static str,
}

/// Write the archive record indices of each partition as `index,partition`.
pub fn write_split_csv(split: &SplitIndices, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    let rows = split
        .train
        .iter()
        .map(|&index| SplitRow { index, partition: "train" })
        .chain(split.validation.iter().map(|&index| SplitRow {
            index,
            partition: "validation",
        }));
    for row in rows {
        writer.serialize(row).context("writing split row")?;
    }
    writer.flush().context("flushing split CSV")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Summary table
// ---------------------------------------------------------------------------

/// One line per loaded dataset: name, record counts, encoded shape.
pub fn summary_table(datasets: &[LoadedDataset]) -> Result<String> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("dataset", DataType::Utf8, false),
        Field::new("records", DataType::UInt64, false),
        Field::new("validation", DataType::UInt64, true),
        Field::new("residues", DataType::UInt64, false),
    ]));
    let names = StringArray::from_iter_values(datasets.iter().map(|d| d.kind().to_string()));
    let records = UInt64Array::from_iter_values(datasets.iter().map(|d| d.len() as u64));
    let validation: UInt64Array = datasets
        .iter()
        .map(|d| d.validation().map(|v| v.len() as u64))
        .collect();
    let residues = UInt64Array::from_iter_values(datasets.iter().map(|d| d.shape().1 as u64));

    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(names),
            Arc::new(records),
            Arc::new(validation),
            Arc::new(residues),
        ],
    )
    .context("building summary batch")?;
    Ok(pretty_format_batches(&[batch])
        .context("formatting summary")?
        .to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, ListArray, UInt8Array};
    use ndarray::{Array2, Array3};
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    fn small_set(n: usize) -> EncodedSet {
        EncodedSet {
            sequence: Array2::from_shape_fn((n, 700), |(i, j)| ((i + j) % 21) as u8),
            profile: Array3::from_elem((n, 700, 21), 0.25),
            labels: Array3::from_shape_fn((n, 700, 8), |(i, _, _)| i as f32),
        }
    }

    #[test]
    fn parquet_has_one_row_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cb513.parquet");
        let set = small_set(300);
        write_parquet(&set, &path).unwrap();

        let file = std::fs::File::open(&path).unwrap();
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .unwrap()
            .build()
            .unwrap();
        let mut rows = 0;
        for batch in reader {
            let batch = batch.unwrap();
            let seq = batch
                .column(1)
                .as_any()
                .downcast_ref::<ListArray>()
                .unwrap();
            let first = seq.value(0);
            let first = first.as_any().downcast_ref::<UInt8Array>().unwrap();
            assert_eq!(first.len(), 700);
            assert_eq!(first.value(3) as usize, (rows + 3) % 21);

            let labels = batch
                .column(3)
                .as_any()
                .downcast_ref::<ListArray>()
                .unwrap();
            assert_eq!(labels.value(0).len(), 700 * 8);
            rows += batch.num_rows();
        }
        assert_eq!(rows, 300);
    }

    #[test]
    fn split_csv_lists_both_partitions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("split.csv");
        let split = SplitIndices {
            train: vec![4, 0, 2],
            validation: vec![1],
        };
        write_split_csv(&split, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines,
            vec!["index,partition", "4,train", "0,train", "2,train", "1,validation"]
        );
    }
}
