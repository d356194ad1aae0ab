use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use schema_import::splitter::{split_batches, split_data_dump};
use std::hint::black_box;

fn generate_data_dump(rows: usize) -> String {
    let mut sql = String::from(
        "INSERT INTO [dbo].[ITEM] ([Num], [strName], [Kind], [Slot], [Price]) VALUES\n",
    );
    for i in 0..rows {
        sql.push_str(&format!(
            "({}, 'Item number {}', {}, {}, {}),\n",
            i,
            i,
            i % 255,
            i % 14,
            i * 100
        ));
    }
    sql.push('\n');
    sql
}

fn generate_ddl_script(objects: usize) -> String {
    let mut sql = String::from("USE [KN_online]\nGO\n");
    for i in 0..objects {
        sql.push_str(&format!(
            "SET ANSI_NULLS ON\nGO\nCREATE TABLE [dbo].[TABLE_{}] (\n  [id] int NOT NULL,\n  [name] varchar(50) NULL\n)\nGO\n",
            i
        ));
    }
    sql
}

fn bench_data_dump_windows(c: &mut Criterion) {
    let mut group = c.benchmark_group("data_dump");
    let data = generate_data_dump(50_000);
    group.throughput(Throughput::Bytes(data.len() as u64));

    for width in [2usize, 16, 100, 999] {
        group.bench_with_input(BenchmarkId::new("window", width), &data, |b, data| {
            b.iter(|| black_box(split_data_dump(black_box(data), width)))
        });
    }

    group.finish();
}

fn bench_structural_split(c: &mut Criterion) {
    let mut group = c.benchmark_group("structural");

    for objects in [100usize, 1000, 10_000] {
        let data = generate_ddl_script(objects);
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(BenchmarkId::new("split_batches", objects), &data, |b, data| {
            b.iter(|| black_box(split_batches(black_box(data))))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_data_dump_windows, bench_structural_split);
criterion_main!(benches);
