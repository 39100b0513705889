use ironload::testing::*;
use ironload::*;

const ROWS: usize = 5_000;
const COLS: usize = 6;

fn load_numbered(opts: LoadOptions, max_read: usize) -> anyhow::Result<Vec<ColumnBuffer<u64>>> {
    let mut buffers: Vec<ColumnBuffer<u64>> = (0..COLS).map(|_| ColumnBuffer::new()).collect();
    let mut columns: Vec<ColumnDescriptor<'_>> = buffers
        .iter_mut()
        .enumerate()
        .map(|(i, b)| ColumnDescriptor::new(format!("c{i}"), FromStrParser::<u64>::new("bigint"), b))
        .collect();
    let rows = Loader::new(opts).run(&mut columns, &mut starved_cursor(numbered_rows(ROWS, COLS), max_read))?;
    drop(columns);
    assert_eq!(rows, ROWS as u64);
    Ok(buffers)
}

fn assert_in_order(buffers: &[ColumnBuffer<u64>]) {
    for (c, buf) in buffers.iter().enumerate() {
        let expected: Vec<u64> = (0..ROWS).map(|r| (r * COLS + c) as u64).collect();
        assert_column_eq(buf, &expected);
    }
}

#[test]
fn parallel_rounds_preserve_input_order() -> anyhow::Result<()> {
    let opts = LoadOptions::default().with_threads(4).with_batch_rows(97);
    assert_in_order(&load_numbered(opts, 1_000)?);
    Ok(())
}

#[test]
fn order_holds_without_prefetch() -> anyhow::Result<()> {
    let opts = LoadOptions::default()
        .with_threads(3)
        .with_batch_rows(50)
        .with_prefetch(false);
    assert_in_order(&load_numbered(opts, 333)?);
    Ok(())
}

#[test]
fn records_straddling_every_refill() -> anyhow::Result<()> {
    // Seven-byte reads split nearly every record across refills.
    let opts = LoadOptions::default().with_threads(2).with_batch_rows(256);
    assert_in_order(&load_numbered(opts, 7)?);
    Ok(())
}

#[test]
fn single_worker_matches_many() -> anyhow::Result<()> {
    let one = load_numbered(LoadOptions::default().with_threads(1).with_batch_rows(64), 4096)?;
    let many = load_numbered(LoadOptions::default().with_threads(8).with_batch_rows(64), 4096)?;
    for (a, b) in one.iter().zip(&many) {
        assert_eq!(a.values(), b.values());
    }
    Ok(())
}

#[test]
fn one_appender_per_column() -> anyhow::Result<()> {
    let probes: Vec<_> = (0..COLS).map(|_| AppendProbe::new()).collect();
    let mut buffers: Vec<ColumnBuffer<u64>> = probes
        .iter()
        .map(|p| ColumnBuffer::new().with_probe(p.clone()))
        .collect();
    let mut columns: Vec<ColumnDescriptor<'_>> = buffers
        .iter_mut()
        .enumerate()
        .map(|(i, b)| ColumnDescriptor::new(format!("c{i}"), FromStrParser::<u64>::new("bigint"), b))
        .collect();
    let opts = LoadOptions::default().with_threads(4).with_batch_rows(100);
    Loader::new(opts).run(&mut columns, &mut ReadCursor::from_bytes(numbered_rows(ROWS, COLS)))?;
    drop(columns);

    let rounds = ROWS.div_ceil(100);
    for probe in &probes {
        assert_eq!(probe.max_concurrent(), 1);
        assert_eq!(probe.entries(), rounds);
    }
    Ok(())
}

#[test]
fn worker_count_rules() {
    let cores = num_cpus_hint();
    assert_eq!(worker_count(Some(8), 3, None), 3.min(cores));
    assert_eq!(worker_count(Some(2), 10, None), 2.min(cores));
    assert_eq!(worker_count(Some(8), 10, Some(SMALL_LOAD_ROWS)), 1);
    assert_eq!(worker_count(Some(8), 10, Some(SMALL_LOAD_ROWS + 1)), 8.min(cores));
    assert_eq!(worker_count(None, 1, None), 1);
    assert_eq!(worker_count(Some(64), 0, None), 1);
}

fn num_cpus_hint() -> usize {
    worker_count(None, usize::MAX, None)
}
